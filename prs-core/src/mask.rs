//! Masking for identifiers that appear in logs.
//!
//! Only the first and last few characters survive. Short values are fully
//! masked so the mask never reveals the whole value.

const MASK: &str = "****";

/// `+237691234567` -> `+237****67`.
#[must_use]
pub fn phone(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 7 {
        return MASK.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}{MASK}{tail}")
}

/// `jane.doe@example.com` -> `j****@example.com`.
#[must_use]
pub fn email(value: &str) -> String {
    match value.split_once('@') {
        Some((local, domain)) => match local.chars().next() {
            Some(first) => format!("{first}{MASK}@{domain}"),
            None => format!("{MASK}@{domain}"),
        },
        None => MASK.to_string(),
    }
}

/// `ACC_12345` -> `A****5`. At most a quarter of the characters survive,
/// split between head and tail, so short ids are replaced entirely.
#[must_use]
pub fn account_id(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let keep = chars.len() / 4;
    if keep < 2 {
        return "********".to_string();
    }
    let head_len = keep.div_ceil(2);
    let head: String = chars[..head_len].iter().collect();
    let tail: String = chars[chars.len() - (keep - head_len)..].iter().collect();
    format!("{head}{MASK}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_mask() {
        assert_eq!(phone("+237691234567"), "+237****67");
        assert_eq!(phone("+4912"), "****");
        assert!(!phone("+237691234567").contains("691234"));
    }

    #[test]
    fn test_email_mask() {
        assert_eq!(email("jane.doe@example.com"), "j****@example.com");
        assert_eq!(email("@example.com"), "****@example.com");
        assert_eq!(email("not-an-email"), "****");
    }

    #[test]
    fn test_account_id_mask() {
        assert_eq!(account_id("ACC_12345"), "A****5");
        assert_eq!(account_id("ACC_1"), "********");
        assert_eq!(account_id("AC1"), "********");
        assert_eq!(account_id("ACC_2024_000123"), "AC****3");
    }

    #[test]
    fn test_account_id_mask_hides_most_of_value() {
        for id in ["ACC_1", "ACC_12", "ACC_1234", "ACC_12345", "ACC_2024_000123"] {
            let masked = account_id(id);
            let revealed = masked.chars().filter(|c| *c != '*').count();
            assert!(revealed * 4 <= id.chars().count(), "{id} -> {masked}");
        }
    }
}
