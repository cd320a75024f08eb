//! Input validation for company identifiers.
//!
//! Validation happens before any provider call is spent, so a malformed
//! CNPJ never reaches ReceitaWS.

use url::Url;

/// Strips everything but digits ("11.222.333/0001-81" -> "11222333000181").
pub fn normalize_cnpj(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validates a CNPJ: 14 digits and both check digits correct.
///
/// Formatting characters are ignored; sequences of a single repeated
/// digit (00000000000000 etc.) are rejected even though their check
/// digits verify.
pub fn is_valid_cnpj(raw: &str) -> bool {
    let digits = normalize_cnpj(raw);
    if digits.len() != 14 {
        return false;
    }

    let nums: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if nums.iter().all(|&d| d == nums[0]) {
        return false;
    }

    let dv1 = cnpj_check_digit(&nums[..12], &[5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]);
    if nums[12] != dv1 {
        return false;
    }

    let dv2 = cnpj_check_digit(&nums[..13], &[6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]);
    nums[13] == dv2
}

fn cnpj_check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let rem = sum % 11;
    if rem < 2 {
        0
    } else {
        11 - rem
    }
}

/// Checks that a website string parses as an http(s) URL with a host.
///
/// Accepts bare domains ("acme.com.br") by assuming https.
pub fn normalize_website(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    let host = url.host_str()?;
    if !host.contains('.') {
        return None;
    }

    Some(candidate)
}

/// Extracts the bare domain from a website URL, for provider queries.
pub fn domain_of(website: &str) -> Option<String> {
    Url::parse(website)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_formatted_cnpj() {
        assert_eq!(normalize_cnpj("11.222.333/0001-81"), "11222333000181");
        assert_eq!(normalize_cnpj("11222333000181"), "11222333000181");
    }

    #[test]
    fn accepts_valid_cnpj() {
        assert!(is_valid_cnpj("11222333000181"));
        assert!(is_valid_cnpj("11.222.333/0001-81"));
        // TOTVS S.A.
        assert!(is_valid_cnpj("53.113.791/0001-22"));
    }

    #[test]
    fn rejects_bad_check_digits() {
        assert!(!is_valid_cnpj("11222333000182"));
        assert!(!is_valid_cnpj("11222333000191"));
    }

    #[test]
    fn rejects_wrong_length_and_repeats() {
        assert!(!is_valid_cnpj(""));
        assert!(!is_valid_cnpj("123"));
        assert!(!is_valid_cnpj("112223330001811"));
        assert!(!is_valid_cnpj("00000000000000"));
        assert!(!is_valid_cnpj("11111111111111"));
    }

    #[test]
    fn website_normalization() {
        assert_eq!(
            normalize_website("acme.com.br"),
            Some("https://acme.com.br".to_string())
        );
        assert_eq!(
            normalize_website("https://acme.com.br/about"),
            Some("https://acme.com.br/about".to_string())
        );
        assert_eq!(normalize_website(""), None);
        assert_eq!(normalize_website("localhost"), None);
    }

    #[test]
    fn domain_extraction_strips_www() {
        assert_eq!(
            domain_of("https://www.acme.com.br/contact"),
            Some("acme.com.br".to_string())
        );
    }
}
