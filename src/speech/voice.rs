//! Voice selection policy

/// A voice offered by the speech output platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// BCP 47 tag, e.g. `en-US`
    pub lang: String,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
        }
    }

    fn matches_locale(&self, locale: &str) -> bool {
        self.lang.replace('_', "-").eq_ignore_ascii_case(locale)
    }
}

/// Pick a voice for `locale`: the preferred name among locale matches, else
/// the first locale match. `None` means the platform default.
pub fn select_voice<'a>(
    voices: &'a [Voice],
    locale: &str,
    preferred: Option<&str>,
) -> Option<&'a Voice> {
    let mut matching = voices.iter().filter(|v| v.matches_locale(locale));

    if let Some(name) = preferred {
        if let Some(voice) = matching.clone().find(|v| v.name == name) {
            return Some(voice);
        }
    }

    matching.next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voices() -> Vec<Voice> {
        vec![
            Voice::new("Thomas", "fr-FR"),
            Voice::new("Alex", "en-US"),
            Voice::new("Google US English", "en_US"),
            Voice::new("Daniel", "en-GB"),
        ]
    }

    #[test]
    fn test_prefers_named_voice() {
        let voices = voices();
        let voice = select_voice(&voices, "en-US", Some("Google US English")).unwrap();
        assert_eq!(voice.name, "Google US English");
    }

    #[test]
    fn test_falls_back_to_first_locale_match() {
        let voices = voices();
        let voice = select_voice(&voices, "en-US", Some("Samantha")).unwrap();
        assert_eq!(voice.name, "Alex");
    }

    #[test]
    fn test_preferred_name_in_other_locale_is_skipped() {
        let voices = voices();
        let voice = select_voice(&voices, "en-US", Some("Daniel")).unwrap();
        assert_eq!(voice.name, "Alex");
    }

    #[test]
    fn test_platform_default_when_nothing_matches() {
        let voices = voices();
        assert!(select_voice(&voices, "de-DE", None).is_none());
        assert!(select_voice(&[], "en-US", Some("Alex")).is_none());
    }
}
