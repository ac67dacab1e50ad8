use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use dardasha::chat::ChatController;
use dardasha::chat::config::GeminiConfig;
use dardasha::chat::models::{Conversation, ConversationMode, InlineData, ModelId};
use dardasha::chat::repositories::{HistoryRepository, JsonFileRepository};
use dardasha::chat::services::GeminiClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    info!("Starting dardasha");

    let client = Arc::new(GeminiClient::new(GeminiConfig::from_env()));
    let repo: Arc<dyn HistoryRepository> =
        Arc::new(JsonFileRepository::new().context("Failed to initialize history repository")?);
    let controller = Arc::new(ChatController::load(client, repo).await);

    println!("dardasha — اكتب رسالة أو أمرًا يبدأ بـ / (جرّب /help)");

    let mut model = ModelId::Flash;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            if !run_command(&controller, command, &mut model).await {
                break;
            }
            continue;
        }

        send(&controller, &line, None, model).await;
    }

    Ok(())
}

/// Execute one slash command. Returns false when the REPL should exit.
async fn run_command(controller: &Arc<ChatController>, command: &str, model: &mut ModelId) -> bool {
    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    let rest = rest.trim();

    match name {
        "new" => {
            let mode = if rest == "builder" {
                ConversationMode::Builder
            } else {
                ConversationMode::Chat
            };
            controller.new_conversation(*model, mode).await;
            println!("تم إنشاء محادثة جديدة.");
        }
        "list" => {
            let active = controller.active_id();
            for (index, conversation) in controller.conversations().iter().enumerate() {
                let marker = if active.as_deref() == Some(conversation.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {index}: {}", conversation.title);
            }
        }
        "select" => match conversation_at(controller, rest) {
            Some(conversation) => {
                controller.select_conversation(&conversation.id);
                println!("المحادثة الحالية: {}", conversation.title);
            }
            None => println!("رقم محادثة غير صالح."),
        },
        "rename" => {
            let renamed = match controller.active_id() {
                Some(id) => controller.rename_conversation(&id, rest).await,
                None => false,
            };
            if !renamed {
                println!("تعذّرت إعادة التسمية.");
            }
        }
        "delete" => match conversation_at(controller, rest) {
            Some(conversation) => {
                controller.delete_conversation(&conversation.id).await;
                println!("تم الحذف.");
            }
            None => println!("رقم محادثة غير صالح."),
        },
        "clear" => {
            controller.clear_active_chat().await;
        }
        "model" => {
            *model = match rest {
                "pro" => ModelId::Pro,
                _ => ModelId::Flash,
            };
            println!("النموذج: {}", model.as_str());
        }
        "image" => match rest.split_once(' ') {
            Some((path, prompt)) => match load_image(path) {
                Ok(image) => send(controller, prompt, Some(image), *model).await,
                Err(err) => println!("تعذّرت قراءة الصورة: {err}"),
            },
            None => println!("الاستخدام: /image <مسار> <نص>"),
        },
        "help" => {
            println!("/new [builder], /list, /select <n>, /rename <عنوان>, /delete <n>,");
            println!("/clear, /model <flash|pro>, /image <مسار> <نص>, /quit");
        }
        "quit" | "exit" => return false,
        _ => println!("أمر غير معروف. جرّب /help"),
    }

    true
}

/// Run one send, letting Ctrl-C request cooperative cancellation instead of
/// killing the process.
async fn send(
    controller: &Arc<ChatController>,
    text: &str,
    image: Option<InlineData>,
    model: ModelId,
) {
    let mut task = {
        let controller = controller.clone();
        let text = text.to_string();
        tokio::spawn(async move { controller.send_message(&text, image, model).await })
    };

    let outcome = loop {
        tokio::select! {
            joined = &mut task => break joined.ok().flatten(),
            _ = tokio::signal::ctrl_c() => {
                println!("\n(إيقاف التوليد...)");
                controller.stop_all();
            }
        }
    };

    match outcome {
        Some(outcome) => {
            if let Some(manifest) = &outcome.manifest {
                println!("ملفات المشروع:");
                for file in manifest {
                    println!("  {}", file.path);
                }
            }
            if let Some(conversation) = controller.active_conversation()
                && let Some(last) = conversation.last_message()
                && let Some(text) = last.first_text()
            {
                println!("{text}");
            }
        }
        None => println!("(لا شيء لإرساله)"),
    }
}

fn conversation_at(controller: &Arc<ChatController>, index: &str) -> Option<Conversation> {
    let index: usize = index.parse().ok()?;
    controller.conversations().get(index).cloned()
}

fn load_image(path: &str) -> Result<InlineData> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {path}"))?;
    let mime_type = match Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
        .as_str()
    {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        other => anyhow::bail!("unsupported image type: .{other}"),
    };

    Ok(InlineData {
        mime_type: mime_type.to_string(),
        data: BASE64.encode(bytes),
    })
}
