//! Bot commands and their fixed replies.

/// Reply sent after `/clear`.
pub const CLEARED_TEXT: &str = "✅ История диалога очищена!";

const WELCOME_TEXT: &str = "\
🤖 *DeepSeek AI Assistant*

Добро пожаловать! Я ваш персональный AI-помощник на основе DeepSeek.

*Что я умею:*
• 💬 Отвечать на любые вопросы
• 💻 Помогать с программированием
• 📚 Объяснять сложные темы
• 🌐 Переводить тексты
• 💡 Генерировать идеи

*Доступные команды:*
/start - Запуск бота
/help - Помощь
/clear - Очистить историю диалога
/info - Информация

Просто напишите ваш вопрос!";

const HELP_TEXT: &str = "\
🆘 *Помощь по использованию бота*

*Основные возможности:*
• Общение на любые темы
• Помощь с программированием
• Анализ и объяснения
• Переводы между языками
• Генерация идей и текстов

*Советы:*
• Будьте конкретны в вопросах
• Для кода указывайте язык программирования
• Используйте /clear чтобы очистить историю
• Бот запоминает контекст диалога";

/// Commands understood by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Clear,
    Info,
}

impl Command {
    /// Parse a command from message text.
    ///
    /// Accepts `/name`, `/name@BotName` and trailing arguments when the text
    /// starts with `/`. Anything else, including unknown commands, is `None`
    /// and treated as a question.
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix('/')?;
        let name = rest.split(char::is_whitespace).next()?;
        let name = name.split('@').next().unwrap_or(name);

        match name {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "clear" => Some(Self::Clear),
            "info" => Some(Self::Info),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Clear => "clear",
            Self::Info => "info",
        }
    }
}

pub fn welcome_text() -> &'static str {
    WELCOME_TEXT
}

pub fn help_text() -> &'static str {
    HELP_TEXT
}

/// Bot information for `/info`.
pub fn info_text(model: &str) -> String {
    format!(
        "📊 *Информация о боте*\n\n\
         *Технические данные:*\n\
         • 🤖 AI Модель: {model}\n\
         • 🚀 Версия: {version}\n\
         • 💾 Память: Контекст диалога\n\
         • 🔧 Язык: Rust\n\n\
         *Статус:* ✅ Активен",
        version = env!("CARGO_PKG_VERSION"),
    )
}
