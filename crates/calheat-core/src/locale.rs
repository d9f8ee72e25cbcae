use anyhow::anyhow;

const KO_MONTHS: [&str; 12] = [
    "1월", "2월", "3월", "4월", "5월", "6월", "7월", "8월", "9월", "10월", "11월", "12월",
];
const KO_WEEKDAYS: [&str; 7] = ["월", "화", "수", "목", "금", "토", "일"];

const EN_MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const EN_WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Language of the axis labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    Korean,
    English,
}

impl Locale {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ko" | "kr" | "korean" | "ko-kr" => Ok(Self::Korean),
            "en" | "english" | "en-us" | "en-gb" => Ok(Self::English),
            other => Err(anyhow!("unsupported language: {other} (expected ko or en)")),
        }
    }

    pub fn month_names(self) -> &'static [&'static str; 12] {
        match self {
            Self::Korean => &KO_MONTHS,
            Self::English => &EN_MONTHS,
        }
    }

    /// Monday first, matching the grid rows.
    pub fn weekday_names(self) -> &'static [&'static str; 7] {
        match self {
            Self::Korean => &KO_WEEKDAYS,
            Self::English => &EN_WEEKDAYS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Locale;

    #[test]
    fn parses_language_tags() {
        assert_eq!(Locale::parse("KO").expect("ko"), Locale::Korean);
        assert_eq!(Locale::parse(" en ").expect("en"), Locale::English);
        assert!(Locale::parse("fr").is_err());
    }

    #[test]
    fn names_are_monday_first() {
        assert_eq!(Locale::Korean.weekday_names()[0], "월");
        assert_eq!(Locale::English.weekday_names()[6], "Sun");
        assert_eq!(Locale::Korean.month_names()[11], "12월");
    }
}
