//! Status-code classification per verb.

use crate::http::HttpMethod;

/// Outcome of classifying a response status for a verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    Failure { status: u16 },
}

impl Classification {
    pub fn is_success(&self) -> bool {
        matches!(self, Classification::Success)
    }
}

/// Status codes a verb treats as success.
///
/// POST accepts 201 Created where the others accept 204 No Content.
pub fn success_codes(method: HttpMethod) -> &'static [u16] {
    match method {
        HttpMethod::Get | HttpMethod::Put | HttpMethod::Delete => &[200, 204],
        HttpMethod::Post => &[200, 201],
    }
}

/// Classify `status` for `method`. Any code outside the verb's success set
/// is a failure carrying that exact code.
pub fn classify(method: HttpMethod, status: u16) -> Classification {
    if success_codes(method).contains(&status) {
        Classification::Success
    } else {
        Classification::Failure { status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [HttpMethod; 4] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
    ];

    #[test]
    fn ok_succeeds_for_every_verb() {
        for method in ALL {
            assert!(classify(method, 200).is_success(), "{method}");
        }
    }

    #[test]
    fn no_content_succeeds_except_for_post() {
        assert!(classify(HttpMethod::Get, 204).is_success());
        assert!(classify(HttpMethod::Put, 204).is_success());
        assert!(classify(HttpMethod::Delete, 204).is_success());
        assert_eq!(
            classify(HttpMethod::Post, 204),
            Classification::Failure { status: 204 }
        );
    }

    #[test]
    fn created_succeeds_only_for_post() {
        assert!(classify(HttpMethod::Post, 201).is_success());
        for method in [HttpMethod::Get, HttpMethod::Put, HttpMethod::Delete] {
            assert_eq!(
                classify(method, 201),
                Classification::Failure { status: 201 },
                "{method}"
            );
        }
    }

    #[test]
    fn other_codes_fail_with_the_exact_code() {
        for method in ALL {
            for status in [202, 301, 304, 400, 404, 422, 500, 503] {
                assert_eq!(classify(method, status), Classification::Failure { status });
            }
        }
    }
}
