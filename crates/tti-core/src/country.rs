//! Country and HS-code normalization.
//!
//! Callers pass countries as full names ("Mexico") or ISO 3166-1
//! alpha-2 codes ("MX") interchangeably. All internal comparisons,
//! cache keys, and strategy dispatch operate on the normalized
//! two-letter form produced here.

/// Normalize a country identifier to its two-letter code.
///
/// Known full names map explicitly; anything else is uppercased and
/// truncated to two characters, which keeps unknown-but-valid alpha-2
/// codes intact.
pub fn normalize_country_code(country: &str) -> String {
    let trimmed = country.trim();
    match trimmed {
        "Mexico" | "mexico" | "MX" | "mx" => "MX".to_string(),
        "Canada" | "canada" | "CA" | "ca" => "CA".to_string(),
        "United States" | "USA" | "usa" | "US" | "us" => "US".to_string(),
        "China" | "china" | "CN" | "cn" => "CN".to_string(),
        other => other.chars().take(2).collect::<String>().to_uppercase(),
    }
}

/// Human-readable country name for a two-letter code, falling back to
/// the code itself for countries we have no display name for.
pub fn country_name(code: &str) -> &str {
    match code {
        "US" => "United States",
        "CA" => "Canada",
        "MX" => "Mexico",
        "CN" => "China",
        "TW" => "Taiwan",
        "KR" => "South Korea",
        "JP" => "Japan",
        "VN" => "Vietnam",
        "TH" => "Thailand",
        other => other,
    }
}

/// Whether a Section 301 policy surcharge can apply to this
/// origin/destination pair.
///
/// True iff the component's country of origin (where it was made, not
/// where it shipped from) normalizes to `CN` and the destination
/// normalizes to `US`. Goods of any other origin routed through China,
/// or Chinese-origin goods bound anywhere but the US, are never in
/// scope.
pub fn section_301_applies(origin_country: &str, destination_country: &str) -> bool {
    normalize_country_code(origin_country) == "CN"
        && normalize_country_code(destination_country) == "US"
}

/// Canonicalize an HS code to the 10-digit form used for cache keys
/// and provider requests.
///
/// Reference tables store dotted 8-digit codes ("8517.62.00"); the
/// wire format is 10 digits with no separators. Non-digit characters
/// are stripped and the result is zero-padded or truncated to 10.
pub fn normalize_hs_code(hs_code: &str) -> String {
    let digits: String = hs_code.chars().filter(|c| c.is_ascii_digit()).collect();
    let mut padded = digits;
    while padded.len() < 10 {
        padded.push('0');
    }
    padded.truncate(10);
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_names_normalize_to_codes() {
        assert_eq!(normalize_country_code("Mexico"), "MX");
        assert_eq!(normalize_country_code("Canada"), "CA");
        assert_eq!(normalize_country_code("United States"), "US");
        assert_eq!(normalize_country_code("USA"), "US");
        assert_eq!(normalize_country_code("China"), "CN");
    }

    #[test]
    fn codes_pass_through() {
        assert_eq!(normalize_country_code("MX"), "MX");
        assert_eq!(normalize_country_code("us"), "US");
        assert_eq!(normalize_country_code(" CA "), "CA");
    }

    #[test]
    fn unknown_countries_truncate_to_two_uppercase() {
        assert_eq!(normalize_country_code("Vietnam"), "VI");
        assert_eq!(normalize_country_code("de"), "DE");
    }

    #[test]
    fn section_301_only_for_cn_to_us() {
        assert!(section_301_applies("CN", "US"));
        assert!(section_301_applies("China", "United States"));
        assert!(!section_301_applies("MX", "US"));
        assert!(!section_301_applies("US", "CN"));
        assert!(!section_301_applies("CN", "CA"));
        assert!(!section_301_applies("US", "US"));
    }

    #[test]
    fn hs_code_strips_dots_and_pads() {
        assert_eq!(normalize_hs_code("8517.62.00"), "8517620000");
        assert_eq!(normalize_hs_code("3916.90.50"), "3916905000");
        assert_eq!(normalize_hs_code("8517620000"), "8517620000");
        assert_eq!(normalize_hs_code(""), "0000000000");
        assert_eq!(normalize_hs_code("85 17-62"), "8517620000");
    }

    #[test]
    fn hs_code_truncates_overlong_input() {
        assert_eq!(normalize_hs_code("851762000099"), "8517620000");
    }
}
