/// English country names and common aliases mapped to ISO 3166-1 alpha-2.
const COUNTRY_NAMES: &[(&str, &str)] = &[
    ("argentina", "AR"),
    ("australia", "AU"),
    ("austria", "AT"),
    ("belgium", "BE"),
    ("brazil", "BR"),
    ("canada", "CA"),
    ("chile", "CL"),
    ("china", "CN"),
    ("colombia", "CO"),
    ("croatia", "HR"),
    ("czech republic", "CZ"),
    ("czechia", "CZ"),
    ("denmark", "DK"),
    ("egypt", "EG"),
    ("england", "GB"),
    ("estonia", "EE"),
    ("finland", "FI"),
    ("france", "FR"),
    ("germany", "DE"),
    ("deutschland", "DE"),
    ("great britain", "GB"),
    ("greece", "GR"),
    ("hong kong", "HK"),
    ("hungary", "HU"),
    ("iceland", "IS"),
    ("india", "IN"),
    ("indonesia", "ID"),
    ("ireland", "IE"),
    ("israel", "IL"),
    ("italy", "IT"),
    ("italia", "IT"),
    ("japan", "JP"),
    ("latvia", "LV"),
    ("lithuania", "LT"),
    ("luxembourg", "LU"),
    ("malaysia", "MY"),
    ("mexico", "MX"),
    ("morocco", "MA"),
    ("netherlands", "NL"),
    ("the netherlands", "NL"),
    ("holland", "NL"),
    ("new zealand", "NZ"),
    ("northern ireland", "GB"),
    ("norway", "NO"),
    ("peru", "PE"),
    ("philippines", "PH"),
    ("poland", "PL"),
    ("portugal", "PT"),
    ("romania", "RO"),
    ("scotland", "GB"),
    ("singapore", "SG"),
    ("slovakia", "SK"),
    ("slovenia", "SI"),
    ("south africa", "ZA"),
    ("south korea", "KR"),
    ("korea", "KR"),
    ("spain", "ES"),
    ("espana", "ES"),
    ("españa", "ES"),
    ("sweden", "SE"),
    ("switzerland", "CH"),
    ("taiwan", "TW"),
    ("thailand", "TH"),
    ("turkey", "TR"),
    ("türkiye", "TR"),
    ("uae", "AE"),
    ("united arab emirates", "AE"),
    ("uk", "GB"),
    ("u.k.", "GB"),
    ("united kingdom", "GB"),
    ("ukraine", "UA"),
    ("united states", "US"),
    ("united states of america", "US"),
    ("us", "US"),
    ("u.s.", "US"),
    ("usa", "US"),
    ("u.s.a.", "US"),
    ("america", "US"),
    ("vietnam", "VN"),
    ("wales", "GB"),
];

fn lookup(name: &str) -> Option<&'static str> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    COUNTRY_NAMES
        .iter()
        .find(|(n, _)| *n == needle)
        .map(|(_, code)| *code)
}

fn explicit_code(code: &str) -> Option<String> {
    let code = code.trim();
    (code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| code.to_ascii_uppercase())
}

/// Resolves a two-letter country code from, in order: an explicit code, a
/// country name, or the last comma-separated part of an address.
pub fn infer_country_code(
    explicit: Option<&str>,
    country: Option<&str>,
    address: Option<&str>,
) -> Option<String> {
    if let Some(code) = explicit.and_then(explicit_code) {
        return Some(code);
    }
    if let Some(code) = country.and_then(lookup) {
        return Some(code.to_string());
    }
    address
        .and_then(|a| a.rsplit(',').next())
        .and_then(lookup)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_code_wins() {
        assert_eq!(infer_country_code(Some("fr"), Some("Germany"), None), Some("FR".into()));
        assert_eq!(infer_country_code(Some(" de "), None, None), Some("DE".into()));
    }

    #[test]
    fn malformed_explicit_code_falls_through() {
        assert_eq!(infer_country_code(Some("FRA"), Some("France"), None), Some("FR".into()));
        assert_eq!(infer_country_code(Some("1x"), None, None), None);
    }

    #[test]
    fn country_names_and_aliases() {
        assert_eq!(infer_country_code(None, Some("USA"), None), Some("US".into()));
        assert_eq!(infer_country_code(None, Some("England"), None), Some("GB".into()));
        assert_eq!(infer_country_code(None, Some("  the Netherlands "), None), Some("NL".into()));
        assert_eq!(infer_country_code(None, Some("Atlantis"), None), None);
    }

    #[test]
    fn address_tail_is_last_resort() {
        assert_eq!(
            infer_country_code(None, None, Some("12 Rue de Rivoli, 75001 Paris, France")),
            Some("FR".into())
        );
        assert_eq!(
            infer_country_code(None, Some("Narnia"), Some("1 Main St, Springfield, USA")),
            Some("US".into())
        );
        assert_eq!(infer_country_code(None, None, Some("1 Main St")), None);
        assert_eq!(infer_country_code(None, None, None), None);
    }
}
