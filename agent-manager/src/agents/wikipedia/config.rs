use pulse::extract::FieldPath;
use pulse::metric::{MetricName, MetricSpec};

pub const GUID: &str = "io.pulse.wikipedia";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const SCHEME: &str = "https";
pub const STATISTICS_PATH: &str =
    "/w/api.php?action=query&format=json&meta=siteinfo&siprop=statistics";
pub const ARTICLES_FIELD: &[&str] = &["query", "statistics", "articles"];

pub const ARTICLES_CREATED: (&str, &str) = ("Articles/Created", "articles/sec");
pub const ARTICLES_COUNT: (&str, &str) = ("Articles/Count", "articles");

/// Article count as a gauge, plus its per-second rate of change.
///
/// Empty only if `ARTICLES_FIELD` is not a valid path, which agent
/// construction then rejects as a configuration error.
pub fn metric_specs() -> Vec<MetricSpec> {
    articles_field()
        .into_iter()
        .map(|field| MetricSpec {
            field,
            gauge: Some(MetricName::new(ARTICLES_COUNT.0, ARTICLES_COUNT.1)),
            rate: Some(MetricName::new(ARTICLES_CREATED.0, ARTICLES_CREATED.1)),
        })
        .collect()
}

pub fn articles_field() -> Option<FieldPath> {
    FieldPath::new(ARTICLES_FIELD.iter().copied())
}
