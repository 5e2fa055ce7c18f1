// Client-side route table and navigation guard.
//
// The guard is a pure state machine over two route classes: protected routes
// require a logged-in session, guest-only routes (login/register) require a
// logged-out one. It reads only the already-loaded session snapshot —
// evaluating a transition never touches the network.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::session::SessionStore;

// ---------------------------------------------------------------------------
// Route table
// ---------------------------------------------------------------------------

/// Access class of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Reachable regardless of session state.
    Public,
    /// Requires a logged-in session.
    Protected,
    /// Reachable only while logged out (login / register).
    GuestOnly,
}

#[derive(Debug, Clone, Copy)]
struct RouteDef {
    /// Path pattern; `:name` segments match any single segment.
    pattern: &'static str,
    name: &'static str,
    access: Access,
}

/// Route names with dedicated semantics in the guard.
pub const ROUTE_LOGIN: &str = "login";
pub const ROUTE_HOME: &str = "home";
pub const ROUTE_NOT_FOUND: &str = "not-found";

const ROUTES: &[RouteDef] = &[
    RouteDef { pattern: "/login", name: ROUTE_LOGIN, access: Access::GuestOnly },
    RouteDef { pattern: "/register", name: "register", access: Access::GuestOnly },
    RouteDef { pattern: "/", name: ROUTE_HOME, access: Access::Public },
    // Knowledge base
    RouteDef { pattern: "/knowledge", name: "knowledge-list", access: Access::Protected },
    RouteDef { pattern: "/knowledge/create", name: "knowledge-create", access: Access::Protected },
    RouteDef { pattern: "/knowledge/:id", name: "knowledge-detail", access: Access::Protected },
    RouteDef { pattern: "/knowledge/:id/edit", name: "knowledge-edit", access: Access::Protected },
    // Question banks
    RouteDef { pattern: "/questions/banks", name: "question-bank-list", access: Access::Protected },
    RouteDef { pattern: "/questions/banks/create", name: "question-bank-create", access: Access::Protected },
    RouteDef { pattern: "/questions/banks/:id", name: "question-bank-detail", access: Access::Protected },
    RouteDef { pattern: "/questions/banks/:id/edit", name: "question-bank-edit", access: Access::Protected },
    // Questions
    RouteDef { pattern: "/questions/create", name: "question-create", access: Access::Protected },
    RouteDef { pattern: "/questions/:id/edit", name: "question-edit", access: Access::Protected },
    // Positions
    RouteDef { pattern: "/positions", name: "position-list", access: Access::Protected },
    RouteDef { pattern: "/positions/create", name: "position-create", access: Access::Protected },
    RouteDef { pattern: "/positions/:id", name: "position-detail", access: Access::Protected },
    RouteDef { pattern: "/positions/:id/edit", name: "position-edit", access: Access::Protected },
];

/// The location the router currently points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub name: String,
    pub path: String,
    /// Original target path preserved when the guard bounced a protected
    /// navigation to login, so the view layer can return there after login.
    pub redirect: Option<String>,
}

impl Location {
    fn new(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            redirect: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Route matcher + navigation guard over the shared session state.
pub struct Router {
    session: Arc<SessionStore>,
    current: Mutex<Location>,
}

impl Router {
    /// Create a router pointing at home.
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self {
            session,
            current: Mutex::new(Location::new(ROUTE_HOME, "/")),
        }
    }

    fn current_mut(&self) -> MutexGuard<'_, Location> {
        self.current.lock().expect("router state mutex poisoned")
    }

    /// The location the router currently points at.
    pub fn current(&self) -> Location {
        self.current_mut().clone()
    }

    /// Attempt a navigation to `path`, applying the guard. Returns the
    /// location actually arrived at, which becomes the current location.
    pub fn navigate(&self, path: &str) -> Location {
        let (name, access) = match_route(path);

        let destination = match access {
            Access::Protected if !self.session.is_logged_in() => {
                debug!(target_path = path, "guard: protected route while logged out");
                let mut login = Location::new(ROUTE_LOGIN, "/login");
                login.redirect = Some(path.to_string());
                login
            }
            Access::GuestOnly if self.session.is_logged_in() => {
                debug!(target_path = path, "guard: guest-only route while logged in");
                Location::new(ROUTE_HOME, "/")
            }
            _ => Location::new(name, path),
        };

        *self.current_mut() = destination.clone();
        destination
    }

    /// Converge the UI to the logged-out state: used by the HTTP pipeline
    /// when the backend rejects the session. Unconditional — no guard
    /// evaluation, no redirect target.
    pub fn force_login(&self) {
        *self.current_mut() = Location::new(ROUTE_LOGIN, "/login");
    }
}

/// Match `path` against the route table. Unmatched paths resolve to the
/// catch-all not-found route, which is unconstrained.
fn match_route(path: &str) -> (&'static str, Access) {
    let segments: Vec<&str> = split_path(path);

    for route in ROUTES {
        let pattern_segments: Vec<&str> = split_path(route.pattern);
        if pattern_segments.len() != segments.len() {
            continue;
        }
        let matched = pattern_segments
            .iter()
            .zip(&segments)
            .all(|(pat, seg)| pat.starts_with(':') || pat == seg);
        if matched {
            return (route.name, route.access);
        }
    }

    (ROUTE_NOT_FOUND, Access::Public)
}

/// Split a path into its non-empty segments, ignoring any query string.
fn split_path(path: &str) -> Vec<&str> {
    let path = path.split('?').next().unwrap_or(path);
    path.split('/').filter(|s| !s.is_empty()).collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
