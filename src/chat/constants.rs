//! Fixed prompts and localized strings shown inside conversations.

/// System prompt sent with every streaming request.
pub const SYSTEM_PROMPT: &str = "أنت مساعد ذكي وودود. أجب دائمًا باللغة العربية بأسلوب واضح ومباشر، \
واستخدم تنسيق ماركداون عند الحاجة.";

/// Title given to a conversation created explicitly, before any message is sent.
pub const NEW_CONVERSATION_TITLE: &str = "محادثة جديدة";

/// Provisional title when the first send carries only an image.
pub const IMAGE_ONLY_TITLE: &str = "صورة جديدة";

/// Stand-in for the user prompt in title generation when only an image was sent.
pub const IMAGE_ONLY_PROMPT: &str = "صورة";

/// Shown in place of the assistant reply when a generation call fails.
pub const CONNECTION_ERROR_MESSAGE: &str = "عذرًا، في مشكلة بالاتصال!";

/// Shown when no API key is configured.
pub const MISSING_KEY_MESSAGE: &str = "مفتاح GEMINI_API_KEY غير مضبوط.";

/// Shown when the model's manifest output could not be parsed.
pub const MANIFEST_PARSE_ERROR_MESSAGE: &str = "تعذّر قراءة ملفات المشروع من ردّ النموذج.";

/// Confirmation message after a successful builder-mode generation.
pub const MANIFEST_READY_MESSAGE: &str = "تم تجهيز ملفات المشروع، جاهزة للتنزيل.";

/// Number of characters of the first user text used as the provisional title.
pub const PROVISIONAL_TITLE_CHARS: usize = 30;
