use tracing::{debug, warn};

use crate::config::MeshConfig;

/// Decide whether validation and authentication are skipped for `path`.
///
/// `path` is the request path, optionally followed by `?` and the query, so that
/// a pattern such as `/byPassMe` also matches `/byPassMe?x=1`. Matching is case
/// sensitive and a pattern never covers sub-paths unless it ends in `*`. The
/// health route is compared against the path alone.
pub fn should_bypass(request_id: &str, config: &MeshConfig, path: &str) -> bool {
    if config.bypass_all_routes {
        warn!(request_id = %request_id, "Bypassing validation and authentication for ALL routes");
        return true;
    }

    let patterns = &config.mesh.authentication.bypass_routes;

    if patterns.iter().any(|pattern| pattern == path) {
        debug!(request_id = %request_id, path, "Route matches bypass pattern");
        return true;
    }

    let wildcard_match = patterns.iter().find(|pattern| {
        pattern
            .strip_suffix('*')
            .is_some_and(|prefix| path.starts_with(prefix))
    });
    if let Some(pattern) = wildcard_match {
        debug!(request_id = %request_id, path, pattern = %pattern, "Route matches wildcard bypass pattern");
        return true;
    }

    let query_match = patterns
        .iter()
        .filter(|pattern| !pattern.ends_with('*'))
        .find(|pattern| {
            path.strip_prefix(pattern.as_str())
                .is_some_and(|rest| rest.starts_with('?'))
        });
    if let Some(pattern) = query_match {
        debug!(request_id = %request_id, path, pattern = %pattern, "Route matches bypass pattern ignoring query");
        return true;
    }

    let health_check = &config.mesh.health_check;
    let route_path = path.split_once('?').map_or(path, |(route_path, _)| route_path);
    if health_check.enable && route_path == health_check.route {
        debug!(request_id = %request_id, path, "Health check route");
        return true;
    }

    false
}
