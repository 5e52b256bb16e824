#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotText {
    Welcome,
    ChooseJob,
    NoJobs,
    SurveyComplete,
    AnswerSaved,
    InvalidOption,
    ChooseOption,
    TypeAnswer,
    UploadFile,
    SendFile,
    AlreadyApplied,
    StartHint,
}

pub fn bot_text(lang: &str, text: BotText) -> &'static str {
    match lang {
        "ru" => ru(text),
        "uz" => uz(text),
        _ => en(text),
    }
}

fn en(text: BotText) -> &'static str {
    match text {
        BotText::Welcome => "👋 Welcome! Please choose a language:",
        BotText::ChooseJob => "📋 Please select a position to apply for:",
        BotText::NoJobs => "No positions available at the moment.",
        BotText::SurveyComplete => "✅ Thank you! Your application has been submitted successfully.",
        BotText::AnswerSaved => "✅ Answer saved.",
        BotText::InvalidOption => "⚠️ Please select one of the provided options.",
        BotText::ChooseOption => "⚠️ Please choose one of the buttons above.",
        BotText::TypeAnswer => "Please type your answer:",
        BotText::UploadFile => "Please upload your file (resume, document, etc.):",
        BotText::SendFile => "📎 Please send a file, not text.",
        BotText::AlreadyApplied => "You have already applied for this position. We will contact you soon.",
        BotText::StartHint => "Send /start to see open positions.",
    }
}

fn ru(text: BotText) -> &'static str {
    match text {
        BotText::Welcome => "👋 Добро пожаловать! Выберите язык:",
        BotText::ChooseJob => "📋 Выберите вакансию:",
        BotText::NoJobs => "В данный момент нет доступных вакансий.",
        BotText::SurveyComplete => "✅ Спасибо! Ваша заявка успешно отправлена.",
        BotText::AnswerSaved => "✅ Ответ сохранён.",
        BotText::InvalidOption => "⚠️ Пожалуйста, выберите один из предложенных вариантов.",
        BotText::ChooseOption => "⚠️ Пожалуйста, нажмите одну из кнопок выше.",
        BotText::TypeAnswer => "Введите ваш ответ:",
        BotText::UploadFile => "Пожалуйста, загрузите файл (резюме, документ и т.д.):",
        BotText::SendFile => "📎 Пожалуйста, отправьте файл, а не текст.",
        BotText::AlreadyApplied => "Вы уже откликнулись на эту вакансию. Мы скоро с вами свяжемся.",
        BotText::StartHint => "Отправьте /start, чтобы увидеть вакансии.",
    }
}

fn uz(text: BotText) -> &'static str {
    match text {
        BotText::Welcome => "👋 Xush kelibsiz! Tilni tanlang:",
        BotText::ChooseJob => "📋 Vakansiyani tanlang:",
        BotText::NoJobs => "Hozirda mavjud vakansiyalar yo'q.",
        BotText::SurveyComplete => "✅ Rahmat! Arizangiz muvaffaqiyatli yuborildi.",
        BotText::AnswerSaved => "✅ Javob saqlandi.",
        BotText::InvalidOption => "⚠️ Iltimos, taklif etilgan variantlardan birini tanlang.",
        BotText::ChooseOption => "⚠️ Iltimos, yuqoridagi tugmalardan birini bosing.",
        BotText::TypeAnswer => "Javobingizni kiriting:",
        BotText::UploadFile => "Iltimos, fayl yuklang (rezyume, hujjat va boshqalar):",
        BotText::SendFile => "📎 Iltimos, matn emas, fayl yuboring.",
        BotText::AlreadyApplied => "Siz bu vakansiyaga allaqachon ariza topshirgansiz. Tez orada bog'lanamiz.",
        BotText::StartHint => "Vakansiyalarni ko'rish uchun /start yuboring.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_language_falls_back_to_english() {
        assert_eq!(bot_text("de", BotText::NoJobs), bot_text("en", BotText::NoJobs));
        assert_ne!(bot_text("ru", BotText::NoJobs), bot_text("en", BotText::NoJobs));
    }
}
