// Source Credibility Checker
// Matches a URL's host against the credible Nigerian outlet table

use crate::models::SourceCredibilityResult;
use crate::services::catalog::Catalog;
use rand::Rng;
use url::Url;

/// Unknown hosts get a score drawn from `0..UNKNOWN_SOURCE_CEILING`.
const UNKNOWN_SOURCE_CEILING: u8 = 40;

pub fn check_source_credibility(url: &str) -> SourceCredibilityResult {
    check_source_credibility_with(&Catalog::builtin(), url, &mut rand::thread_rng())
}

/// Same as [`check_source_credibility`] with an explicit catalog and RNG, so
/// the unknown-source score can be made reproducible.
pub fn check_source_credibility_with<R: Rng + ?Sized>(
    catalog: &Catalog,
    url: &str,
    rng: &mut R,
) -> SourceCredibilityResult {
    let host = match extract_host(url) {
        Some(h) => h,
        None => return SourceCredibilityResult::unparseable(),
    };

    // Substring match in table order; the first hit wins.
    if let Some(source) = catalog.sources.iter().find(|s| host.contains(&s.domain)) {
        return SourceCredibilityResult {
            is_credible: true,
            source_name: Some(source.name.clone()),
            reliability_score: (source.reliability * 100.0).round().clamp(0.0, 100.0) as u8,
        };
    }

    SourceCredibilityResult {
        is_credible: false,
        source_name: Some(host),
        reliability_score: rng.gen_range(0..UNKNOWN_SOURCE_CEILING),
    }
}

/// Lowercased host with one leading `www.` removed.
pub fn extract_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() {
        return None;
    }
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_punch_with_www() {
        let result = check_source_credibility("https://www.punchng.com/article");
        assert!(result.is_credible);
        assert_eq!(result.source_name.as_deref(), Some("Punch Newspapers"));
        assert_eq!(result.reliability_score, 85);
    }

    #[test]
    fn test_every_table_domain_matches_exactly() {
        let catalog = Catalog::builtin();
        let mut rng = StdRng::seed_from_u64(7);
        for source in &catalog.sources {
            for prefix in ["", "www."] {
                let url = format!("https://{}{}/news/1", prefix, source.domain);
                let result = check_source_credibility_with(&catalog, &url, &mut rng);
                assert!(result.is_credible, "{}", url);
                assert_eq!(result.source_name.as_deref(), Some(source.name.as_str()));
                assert_eq!(
                    result.reliability_score,
                    (source.reliability * 100.0).round() as u8
                );
            }
        }
    }

    #[test]
    fn test_subdomain_matches_by_containment() {
        let result = check_source_credibility("https://sports.guardian.ng/football");
        assert!(result.is_credible);
        assert_eq!(result.source_name.as_deref(), Some("The Guardian Nigeria"));
        assert_eq!(result.reliability_score, 88);
    }

    #[test]
    fn test_first_table_entry_wins_on_overlap() {
        // Host contains both punchng.com and guardian.ng; punchng.com is listed first.
        let result = check_source_credibility("https://punchng.com.guardian.ng/x");
        assert!(result.is_credible);
        assert_eq!(result.source_name.as_deref(), Some("Punch Newspapers"));
        assert_eq!(result.reliability_score, 85);

        let mut reordered = (*Catalog::builtin()).clone();
        let guardian = reordered
            .sources
            .iter()
            .position(|s| s.domain == "guardian.ng")
            .unwrap();
        let entry = reordered.sources.remove(guardian);
        reordered.sources.insert(0, entry);

        let mut rng = StdRng::seed_from_u64(1);
        let result = check_source_credibility_with(&reordered, "https://punchng.com.guardian.ng/x", &mut rng);
        assert_eq!(result.source_name.as_deref(), Some("The Guardian Nigeria"));
        assert_eq!(result.reliability_score, 88);
    }

    #[test]
    fn test_invalid_urls_do_not_panic() {
        for input in ["not a url", "", "punchng.com/article", "http://", "mailto:editor@punchng.com"] {
            let result = check_source_credibility(input);
            assert_eq!(result, SourceCredibilityResult::unparseable(), "{}", input);
        }
    }

    #[test]
    fn test_unknown_source_gets_low_score() {
        let catalog = Catalog::builtin();
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result =
                check_source_credibility_with(&catalog, "https://www.naijagists.blog/post", &mut rng);
            assert!(!result.is_credible);
            assert_eq!(result.source_name.as_deref(), Some("naijagists.blog"));
            assert!(result.reliability_score < 40);
        }
    }

    #[test]
    fn test_unknown_source_reproducible_with_seed() {
        let catalog = Catalog::builtin();
        let a = check_source_credibility_with(&catalog, "https://example.com", &mut StdRng::seed_from_u64(42));
        let b = check_source_credibility_with(&catalog, "https://example.com", &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_extract_host() {
        assert_eq!(extract_host("https://WWW.ChannelsTV.com/x").as_deref(), Some("channelstv.com"));
        assert_eq!(extract_host("https://www.www.example.com").as_deref(), Some("www.example.com"));
        assert_eq!(extract_host("nonsense"), None);
    }
}
