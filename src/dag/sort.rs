//! # Route Specificity Ordering
//!
//! Spec §9: "longer exact paths before shorter; exact before regex before
//! prefix; within equal path kind, more header matches before fewer;
//! within equal header count, lexical path." This is a total order (no two
//! distinct `RouteConditions` ever compare equal unless genuinely
//! identical), which is what makes route-set order independent of
//! insertion order (spec §8 "Route sort totality").

use std::cmp::Ordering;

use super::model::{PathMatch, Route};

fn path_kind_rank(path: &PathMatch) -> u8 {
    match path {
        PathMatch::Exact(_) => 0,
        PathMatch::Regex(_) => 1,
        PathMatch::Prefix(_) => 2,
    }
}

/// Total order comparator: descending specificity, so `sort_by` yields
/// most-specific-first.
pub fn compare_routes(a: &Route, b: &Route) -> Ordering {
    let a_path = &a.conditions.path;
    let b_path = &b.conditions.path;

    path_kind_rank(a_path)
        .cmp(&path_kind_rank(b_path))
        .then_with(|| b_path.literal().len().cmp(&a_path.literal().len()))
        .then_with(|| b.conditions.headers.len().cmp(&a.conditions.headers.len()))
        .then_with(|| a_path.literal().cmp(b_path.literal()))
        .then_with(|| format!("{:?}", a.conditions.headers).cmp(&format!("{:?}", b.conditions.headers)))
}

/// Sorts routes in place by descending specificity. Stable, so routes that
/// compare fully equal (identical conditions, which a valid DAG never
/// produces twice for one vhost) retain their relative input order.
pub fn sort_routes(routes: &mut [Route]) {
    routes.sort_by(compare_routes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::model::{RouteAction, RouteConditions};

    fn route_with(path: PathMatch, headers: usize) -> Route {
        Route {
            conditions: RouteConditions {
                path,
                headers: (0..headers)
                    .map(|i| crate::k8s::types::HeaderConditionSpec {
                        name: format!("h{i}"),
                        present: true,
                        exact: None,
                    })
                    .collect(),
            },
            action: RouteAction::DirectResponse { status_code: 200, body: None },
            force_ssl_redirect_on_insecure_plane: false,
            enable_websockets: false,
            request_headers: None,
            response_headers: None,
            retry: None,
            timeout: None,
            cors: None,
            rate_limit: None,
            ip_allow_deny: Vec::new(),
            jwt_verification: None,
            ext_authz: None,
            mirror: None,
            host_rewrite: None,
            session_affinity: None,
            internal_redirect: None,
        }
    }

    #[test]
    fn exact_beats_regex_beats_prefix() {
        let mut routes = vec![
            route_with(PathMatch::Prefix("/a".into()), 0),
            route_with(PathMatch::Regex("/a.*".into()), 0),
            route_with(PathMatch::Exact("/a".into()), 0),
        ];
        sort_routes(&mut routes);
        assert!(matches!(routes[0].conditions.path, PathMatch::Exact(_)));
        assert!(matches!(routes[1].conditions.path, PathMatch::Regex(_)));
        assert!(matches!(routes[2].conditions.path, PathMatch::Prefix(_)));
    }

    #[test]
    fn longer_exact_paths_before_shorter() {
        let mut routes = vec![
            route_with(PathMatch::Exact("/a".into()), 0),
            route_with(PathMatch::Exact("/a/b/c".into()), 0),
            route_with(PathMatch::Exact("/a/b".into()), 0),
        ];
        sort_routes(&mut routes);
        let paths: Vec<_> = routes.iter().map(|r| r.conditions.path.literal().to_string()).collect();
        assert_eq!(paths, vec!["/a/b/c", "/a/b", "/a"]);
    }

    #[test]
    fn more_header_matches_before_fewer_within_equal_path_kind() {
        let mut routes = vec![
            route_with(PathMatch::Prefix("/a".into()), 0),
            route_with(PathMatch::Prefix("/a".into()), 2),
            route_with(PathMatch::Prefix("/a".into()), 1),
        ];
        sort_routes(&mut routes);
        let header_counts: Vec<_> = routes.iter().map(|r| r.conditions.headers.len()).collect();
        assert_eq!(header_counts, vec![2, 1, 0]);
    }

    #[test]
    fn order_is_independent_of_insertion_order() {
        let mut a = vec![
            route_with(PathMatch::Prefix("/z".into()), 0),
            route_with(PathMatch::Exact("/a".into()), 0),
            route_with(PathMatch::Prefix("/m".into()), 1),
        ];
        let mut b = vec![a[1].clone(), a[2].clone(), a[0].clone()];

        sort_routes(&mut a);
        sort_routes(&mut b);

        let paths_a: Vec<_> = a.iter().map(|r| r.conditions.path.literal().to_string()).collect();
        let paths_b: Vec<_> = b.iter().map(|r| r.conditions.path.literal().to_string()).collect();
        assert_eq!(paths_a, paths_b);
    }
}
