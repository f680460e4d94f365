pub struct SchemaMatcher;

impl SchemaMatcher {
    /// `{name}` matches any single non-empty segment. The query string and
    /// fragment of `concrete_path` are ignored.
    pub fn matches(template: &str, concrete_path: &str) -> bool {
        let concrete = strip_query(concrete_path);

        let template_segments: Vec<&str> = template.split('/').collect();
        let concrete_segments: Vec<&str> = concrete.split('/').collect();

        if template_segments.len() != concrete_segments.len() {
            return false;
        }

        template_segments
            .iter()
            .zip(concrete_segments.iter())
            .all(|(expected, actual)| {
                if is_parameter(expected) {
                    !actual.is_empty()
                } else {
                    expected == actual
                }
            })
    }

    pub fn literal_segments(template: &str) -> usize {
        template
            .split('/')
            .filter(|segment| !segment.is_empty() && !is_parameter(segment))
            .count()
    }

    pub fn parameter_names(template: &str) -> Vec<&str> {
        template
            .split('/')
            .filter(|segment| is_parameter(segment))
            .map(|segment| &segment[1..segment.len() - 1])
            .collect()
    }
}

fn is_parameter(segment: &str) -> bool {
    segment.len() >= 2 && segment.starts_with('{') && segment.ends_with('}')
}

fn strip_query(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parameter_segment_matches() {
        assert!(SchemaMatcher::matches("/iam/users/{id}", "/iam/users/42"));
        assert!(SchemaMatcher::matches(
            "/edge_applications/{app_id}/rules/{rule_id}",
            "/edge_applications/7/rules/abc"
        ));
    }

    #[test]
    fn test_segment_count_mismatch() {
        assert!(!SchemaMatcher::matches("/iam/users/{id}", "/iam/users/42/roles"));
        assert!(!SchemaMatcher::matches("/iam/users/{id}", "/iam/users"));
    }

    #[test]
    fn test_literals_are_case_sensitive() {
        assert!(!SchemaMatcher::matches("/iam/users/{id}", "/IAM/users/42"));
    }

    #[test]
    fn test_empty_segment_does_not_fill_parameter() {
        assert!(!SchemaMatcher::matches("/iam/users/{id}", "/iam/users/"));
    }

    #[test]
    fn test_query_string_ignored() {
        assert!(SchemaMatcher::matches(
            "/account/accounts",
            "/account/accounts?page=2&page_size=10"
        ));
        assert!(SchemaMatcher::matches("/dns/zones/{id}", "/dns/zones/9#records"));
    }

    #[test]
    fn test_literal_segments_and_parameters() {
        assert_eq!(SchemaMatcher::literal_segments("/iam/users/{id}"), 2);
        assert_eq!(SchemaMatcher::literal_segments("/iam/users/me"), 3);
        assert_eq!(
            SchemaMatcher::parameter_names("/storage/buckets/{name}/objects/{key}"),
            vec!["name", "key"]
        );
    }

    fn segment() -> impl Strategy<Value = String> {
        "[a-z0-9_]{1,8}"
    }

    proptest! {
        #[test]
        fn prop_literal_match_with_parameters(
            segments in prop::collection::vec((segment(), any::<bool>()), 1..6)
        ) {
            let template: String = segments
                .iter()
                .enumerate()
                .map(|(i, (s, param))| if *param { format!("/{{p{i}}}") } else { format!("/{s}") })
                .collect();
            let concrete: String = segments.iter().map(|(s, _)| format!("/{s}")).collect();
            prop_assert!(SchemaMatcher::matches(&template, &concrete));
        }

        #[test]
        fn prop_count_mismatch_never_matches(
            template in prop::collection::vec(segment(), 1..6),
            extra in prop::collection::vec(segment(), 1..3)
        ) {
            let t: String = template.iter().map(|s| format!("/{s}")).collect();
            let p: String = template.iter().chain(extra.iter()).map(|s| format!("/{s}")).collect();
            prop_assert!(!SchemaMatcher::matches(&t, &p));
        }
    }
}
