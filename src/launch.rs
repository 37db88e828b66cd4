//! Run launch parameter derivation (spec §6), independent of any CLI
//! parsing so it is unit-testable on its own.

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct LaunchParams {
    pub beats: u32,
    pub section_length: (u32, u32),
}

/// Given the raw launch inputs, validates the `beats`/`word_count`
/// combination and derives `beats`/`section_length` when only `word_count`
/// is given.
///
/// - Exactly one of `beats ∈ [1,20]` or `word_count ∈ (100, 15000)` must be
///   resolvable.
/// - When both are set, `word_count / beats` must fall in `(100, 1000)`.
/// - With only `word_count`: `beats = clamp(round(word_count /
///   section_length_midpoint), 1, 20)`, and
///   `section_length = (floor(0.8 * per), floor(1.2 * per))` where
///   `per = word_count / beats`.
pub fn resolve_launch_params(
    beats: Option<u32>,
    word_count: Option<u32>,
    section_length_midpoint: u32,
) -> Result<LaunchParams, ConfigError> {
    match (beats, word_count) {
        (None, None) => Err(ConfigError::InvalidLaunchParams(
            "one of beats or word_count must be provided".to_string(),
        )),
        (Some(b), None) => {
            validate_beats(b)?;
            let per = section_length_midpoint;
            Ok(LaunchParams {
                beats: b,
                section_length: section_length_range(per),
            })
        }
        (None, Some(wc)) => {
            validate_word_count(wc)?;
            if section_length_midpoint == 0 {
                return Err(ConfigError::InvalidLaunchParams(
                    "section_length_midpoint must be non-zero".to_string(),
                ));
            }
            let raw = wc as f64 / section_length_midpoint as f64;
            let beats = (raw.round() as i64).clamp(1, 20) as u32;
            let per = wc / beats.max(1);
            Ok(LaunchParams {
                beats,
                section_length: section_length_range(per),
            })
        }
        (Some(b), Some(wc)) => {
            validate_beats(b)?;
            validate_word_count(wc)?;
            let quotient = wc as f64 / b as f64;
            if !(100.0 < quotient && quotient < 1000.0) {
                return Err(ConfigError::InvalidLaunchParams(format!(
                    "word_count/beats quotient {quotient:.1} must fall in (100, 1000)"
                )));
            }
            let per = wc / b;
            Ok(LaunchParams {
                beats: b,
                section_length: section_length_range(per),
            })
        }
    }
}

fn validate_beats(beats: u32) -> Result<(), ConfigError> {
    if (1..=20).contains(&beats) {
        Ok(())
    } else {
        Err(ConfigError::InvalidLaunchParams(format!(
            "beats must be in [1,20], got {beats}"
        )))
    }
}

fn validate_word_count(word_count: u32) -> Result<(), ConfigError> {
    if word_count > 100 && word_count < 15000 {
        Ok(())
    } else {
        Err(ConfigError::InvalidLaunchParams(format!(
            "word_count must be in (100, 15000), got {word_count}"
        )))
    }
}

fn section_length_range(per: u32) -> (u32, u32) {
    (
        (0.8 * per as f64).floor() as u32,
        (1.2 * per as f64).floor() as u32,
    )
}

/// ISO 639-1 two-letter language codes this crate accepts. Validation only
/// (no translation tables); a small fixed set grounded in the original's
/// `iso639.py` coverage rather than a full registry dependency.
const ISO_639_1_CODES: &[&str] = &[
    "aa", "ab", "ae", "af", "ak", "am", "an", "ar", "as", "av", "ay", "az", "ba", "be", "bg",
    "bh", "bi", "bm", "bn", "bo", "br", "bs", "ca", "ce", "ch", "co", "cr", "cs", "cu", "cv",
    "cy", "da", "de", "dv", "dz", "ee", "el", "en", "eo", "es", "et", "eu", "fa", "ff", "fi",
    "fj", "fo", "fr", "fy", "ga", "gd", "gl", "gn", "gu", "gv", "ha", "he", "hi", "ho", "hr",
    "ht", "hu", "hy", "hz", "ia", "id", "ie", "ig", "ii", "ik", "io", "is", "it", "iu", "ja",
    "jv", "ka", "kg", "ki", "kj", "kk", "kl", "km", "kn", "ko", "kr", "ks", "ku", "kv", "kw",
    "ky", "la", "lb", "lg", "li", "ln", "lo", "lt", "lu", "lv", "mg", "mh", "mi", "mk", "ml",
    "mn", "mr", "ms", "mt", "my", "na", "nb", "nd", "ne", "ng", "nl", "nn", "no", "nr", "nv",
    "ny", "oc", "oj", "om", "or", "os", "pa", "pi", "pl", "ps", "pt", "qu", "rm", "rn", "ro",
    "ru", "rw", "sa", "sc", "sd", "se", "sg", "si", "sk", "sl", "sm", "sn", "so", "sq", "sr",
    "ss", "st", "su", "sv", "sw", "ta", "te", "tg", "th", "ti", "tk", "tl", "tn", "to", "tr",
    "ts", "tt", "tw", "ty", "ug", "uk", "ur", "uz", "ve", "vi", "vo", "wa", "wo", "xh", "yi",
    "yo", "za", "zh", "zu",
];

pub fn validate_language_code(code: &str) -> Result<(), ConfigError> {
    let lower = code.to_ascii_lowercase();
    if ISO_639_1_CODES.contains(&lower.as_str()) {
        Ok(())
    } else {
        Err(ConfigError::InvalidLanguage(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beats_only_derives_section_length() {
        let params = resolve_launch_params(Some(5), None, 300).unwrap();
        assert_eq!(params.beats, 5);
        assert_eq!(params.section_length, (240, 360));
    }

    #[test]
    fn word_count_only_derives_beats_and_section_length() {
        let params = resolve_launch_params(None, Some(1500), 300).unwrap();
        assert_eq!(params.beats, 5);
    }

    #[test]
    fn both_given_and_quotient_in_range_is_accepted() {
        let params = resolve_launch_params(Some(5), Some(1500), 300).unwrap();
        assert_eq!(params.beats, 5);
    }

    #[test]
    fn both_given_and_quotient_out_of_range_is_rejected() {
        let err = resolve_launch_params(Some(5), Some(50), 300).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLaunchParams(_)));
    }

    #[test]
    fn neither_given_is_rejected() {
        assert!(resolve_launch_params(None, None, 300).is_err());
    }

    #[test]
    fn beats_out_of_range_is_rejected() {
        assert!(resolve_launch_params(Some(21), None, 300).is_err());
    }

    #[test]
    fn valid_language_code_accepted() {
        assert!(validate_language_code("en").is_ok());
        assert!(validate_language_code("EN").is_ok());
    }

    #[test]
    fn invalid_language_code_rejected() {
        assert!(validate_language_code("xx-not-real").is_err());
    }
}
