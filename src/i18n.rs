use serde::{Deserialize, Serialize};

/// 报告输出语言
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetLanguage {
    #[serde(rename = "en")]
    #[default]
    English,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "ko")]
    Korean,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "ru")]
    Russian,
}

/// 语言代码与可接受的别名
const LANGUAGE_TABLE: [(TargetLanguage, &str, &[&str]); 7] = [
    (TargetLanguage::English, "en", &["english", "英文"]),
    (TargetLanguage::Chinese, "zh", &["chinese", "中文", "zh-cn"]),
    (TargetLanguage::Japanese, "ja", &["japanese", "日本語", "日文"]),
    (TargetLanguage::Korean, "ko", &["korean", "한국어", "韩文"]),
    (TargetLanguage::German, "de", &["german", "deutsch", "德文"]),
    (TargetLanguage::French, "fr", &["french", "français", "法文"]),
    (TargetLanguage::Russian, "ru", &["russian", "русский", "俄文"]),
];

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for TargetLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        LANGUAGE_TABLE
            .iter()
            .find(|(_, code, aliases)| *code == wanted || aliases.contains(&wanted.as_str()))
            .map(|(language, _, _)| *language)
            .ok_or_else(|| format!("Unknown target language: {}", s))
    }
}

impl TargetLanguage {
    pub fn code(&self) -> &'static str {
        LANGUAGE_TABLE
            .iter()
            .find(|(language, _, _)| language == self)
            .map(|(_, code, _)| *code)
            .unwrap_or("en")
    }

    /// 报告撰写时附加的语言指令
    pub fn prompt_instruction(&self) -> &'static str {
        match self {
            TargetLanguage::English => {
                "Write the report in English, using precise, professional business language."
            }
            TargetLanguage::Chinese => "请使用中文撰写报告，确保商业表达准确、专业、易于理解。",
            TargetLanguage::Japanese => {
                "レポートは日本語で作成してください。正確で専門的なビジネス表現を心がけてください。"
            }
            TargetLanguage::Korean => {
                "보고서는 한국어로 작성해 주세요. 정확하고 전문적인 비즈니스 표현을 사용해 주세요."
            }
            TargetLanguage::German => {
                "Verfassen Sie den Bericht auf Deutsch in präziser, professioneller Geschäftssprache."
            }
            TargetLanguage::French => {
                "Rédigez le rapport en français, dans un langage d'affaires précis et professionnel."
            }
            TargetLanguage::Russian => {
                "Напишите отчёт на русском языке, используя точный и профессиональный деловой язык."
            }
        }
    }
}
