//! Language tag mapping.
//!
//! Providers disagree on language tags: AWS and Deepgram expect BCP-47
//! tags ("en-US"), Clova expects bare short codes ("ko"). The session
//! configuration carries a short code; each adapter asks for the tag
//! shape its wire protocol wants.

/// Map a short language code to the BCP-47 tag used by AWS and Deepgram.
///
/// Unknown codes pass through unchanged so regional tags supplied
/// directly by the host ("pt-BR") keep working.
pub fn to_bcp47(short: &str) -> &str {
    match short {
        "en" => "en-US",
        "es" => "es-ES",
        "fr" => "fr-FR",
        "de" => "de-DE",
        "it" => "it-IT",
        "pt" => "pt-BR",
        "ja" => "ja-JP",
        "ko" => "ko-KR",
        "zh" => "zh-CN",
        "hi" => "hi-IN",
        "ar" => "ar-SA",
        "ru" => "ru-RU",
        "nl" => "nl-NL",
        "sv" => "sv-SE",
        "pl" => "pl-PL",
        "tr" => "tr-TR",
        other => other,
    }
}

/// Map a language tag down to the bare short code Clova expects.
pub fn to_short(tag: &str) -> &str {
    match tag.split_once('-') {
        Some((short, _)) => short,
        None => tag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_to_bcp47() {
        assert_eq!(to_bcp47("en"), "en-US");
        assert_eq!(to_bcp47("ko"), "ko-KR");
    }

    #[test]
    fn test_unknown_codes_pass_through() {
        assert_eq!(to_bcp47("pt-BR"), "pt-BR");
        assert_eq!(to_bcp47("xx"), "xx");
    }

    #[test]
    fn test_tag_to_short() {
        assert_eq!(to_short("en-US"), "en");
        assert_eq!(to_short("ko"), "ko");
    }
}
