use std::env;

/// Envelopes are always JSON; PHISH_OUTPUT_PRETTY switches to indented output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutputConfig {
    pub pretty: bool,
}

impl OutputConfig {
    pub fn from_env() -> Self {
        let pretty = env::var("PHISH_OUTPUT_PRETTY").ok().as_deref().is_some_and(is_truthy);
        OutputConfig { pretty }
    }
}

fn is_truthy(v: &str) -> bool {
    v.eq_ignore_ascii_case("1") || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
}
