//! Record sales lookup via the Perplexity search model
//!
//! Returns a human-readable figure like "25 million copies sold", or None
//! when no usable number comes back.

use tracing::{info, warn};

use super::source_client::{ChatEndpoint, SourceError, PERPLEXITY_CHAT_URL};

const LOOKUP_TIMEOUT_SECS: u64 = 15;
/// Answers longer than this are prose, not a figure
const MAX_ANSWER_LEN: usize = 100;

const QUALIFIERS: [&str; 5] = ["approximately", "about", "over", "nearly", "around"];

/// Strip filler from a sales answer, keeping just the figure.
/// Returns None when no digits survive.
pub fn clean_sales_figure(answer: &str) -> Option<String> {
    let mut figure = answer
        .replace("copies sold", "")
        .replace("copies", "")
        .trim()
        .to_string();

    for qualifier in QUALIFIERS {
        let matches = figure
            .get(..qualifier.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(qualifier))
            && figure[qualifier.len()..].starts_with(char::is_whitespace);
        if matches {
            figure = figure[qualifier.len()..].trim_start().to_string();
            break;
        }
    }

    if !figure.is_empty() && figure.chars().any(|c| c.is_ascii_digit()) {
        Some(figure)
    } else {
        None
    }
}

/// Sales figure lookup client
pub struct SalesClient {
    endpoint: ChatEndpoint,
}

impl SalesClient {
    pub fn new(perplexity_api_key: String) -> Result<Self, SourceError> {
        Ok(Self {
            endpoint: ChatEndpoint::with_timeout(
                PERPLEXITY_CHAT_URL,
                perplexity_api_key,
                "sonar",
                LOOKUP_TIMEOUT_SECS,
            )?,
        })
    }

    /// Look up worldwide sales for a work. Best-effort: failures and
    /// unusable answers degrade to None.
    pub async fn lookup_sales(&self, work: &str, artist: &str) -> Option<String> {
        let prompt = format!(
            "How many copies has \"{}\" by {} sold worldwide?\n\n\
             Give me just the number in a simple format like \"25 million copies\" or \"500,000 copies\".\n\
             If it's an album, give album sales. If it's a single/track, give single sales.\n\
             If you can't find exact sales data, say \"UNKNOWN\".\n\
             Reply with ONLY the sales figure, nothing else.",
            work, artist
        );

        let result = self
            .endpoint
            .complete(
                "You are a music industry data assistant. Give concise sales figures only.",
                &prompt,
                50,
                0.1,
            )
            .await;

        let answer = match result {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                warn!(work, error = %e, "Sales lookup failed");
                return None;
            }
        };

        if answer.to_uppercase().contains("UNKNOWN") || answer.len() > MAX_ANSWER_LEN {
            info!(work, "No sales data found");
            return None;
        }

        let figure = clean_sales_figure(&answer)?;
        info!(work, figure = %figure, "Sales figure found");
        Some(format!("{} copies sold", figure))
    }
}
