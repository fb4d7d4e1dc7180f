mod command;
mod echo;
mod http;

pub use command::CommandInvoker;
pub use echo::EchoInvoker;
pub use http::HttpInvoker;

/// Last `max_chars` characters of `s`.
pub(crate) fn tail(s: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    match s.char_indices().rev().nth(max_chars - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
