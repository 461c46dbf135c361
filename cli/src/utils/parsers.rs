use station_service::identity::DigestKind;

pub fn parse_digest_kind(s: &str) -> Result<DigestKind, String> {
    s.parse()
}

pub fn parse_view(s: &str) -> Result<View, String> {
    match s.to_lowercase().as_str() {
        "ledger" => Ok(View::Ledger),
        "results" => Ok(View::Results),
        "integrity" => Ok(View::Integrity),
        _ => Err(format!("invalid view: {}", s)),
    }
}

/// Read-only report over the merged stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Ledger,
    Results,
    Integrity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_digest_kind() {
        assert_eq!(parse_digest_kind("sha256"), Ok(DigestKind::Sha256));
        assert_eq!(parse_digest_kind("ROLLING32"), Ok(DigestKind::Rolling32));
        assert!(parse_digest_kind("md5").is_err());
    }

    #[test]
    fn test_parse_view() {
        assert_eq!(parse_view("Results"), Ok(View::Results));
        assert!(parse_view("tally").is_err());
    }
}
