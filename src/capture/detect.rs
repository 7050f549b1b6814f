//! Login-screen detection — decides whether the browser ended up on an
//! authentication wall instead of the dashboard it was sent to.
//!
//! The embed gives no structured "not authorized" signal, so detection
//! is heuristic: the current URL and the visible page text are checked
//! independently and OR-combined.

/// How much of the page text the detector looks at. Login and consent
/// screens put their message well inside this window.
pub const TEXT_PROBE_CHARS: usize = 3000;

/// URL fragments that mean the browser was bounced into an auth flow.
const URL_MARKERS: &[&str] = &["accounts.google.com", "signin", "login"];

/// Phrases (Portuguese and English) seen on login walls, permission
/// errors and broken-embed screens.
const LOGIN_MARKERS: &[&str] = &[
    "faça login",
    "fazer login",
    "sign in",
    "login",
    "entrar",
    "não é possível acessar",
    "access denied",
    "acesso negado",
    "você não tem permissão",
    "permission denied",
    "unauthorized",
    "session expired",
    "sessão expirou",
    "sessão inválida",
    "make sure you have access",
    "verifique se você tem acesso",
    "something went wrong",
    "algo deu errado",
    "unable to load",
    "não foi possível carregar",
];

/// True when the current URL or the page text looks like an
/// authentication wall rather than dashboard content.
pub fn is_login_screen(current_url: &str, page_text: &str) -> bool {
    let url = current_url.to_lowercase();
    if URL_MARKERS.iter().any(|marker| url.contains(marker)) {
        return true;
    }
    let probe: String = page_text.chars().take(TEXT_PROBE_CHARS).collect();
    let probe = probe.to_lowercase();
    LOGIN_MARKERS.iter().any(|marker| probe.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DASHBOARD_URL: &str = "https://lookerstudio.google.com/embed/reporting/abc/page/p1";

    #[test]
    fn clean_dashboard_passes() {
        assert!(!is_login_screen(DASHBOARD_URL, "Receita mensal consolidada"));
        assert!(!is_login_screen("", ""));
    }

    #[test]
    fn auth_redirect_fires_on_url_alone() {
        // Text is perfectly healthy; the URL is what gives it away.
        assert!(is_login_screen(
            "https://accounts.google.com/v3/signin/identifier?continue=x",
            "Receita mensal consolidada"
        ));
        assert!(is_login_screen("https://example.com/LOGIN", ""));
        assert!(is_login_screen("https://example.com/user/signin", ""));
    }

    #[test]
    fn text_markers_fire_case_insensitively() {
        assert!(is_login_screen(DASHBOARD_URL, "Please Sign In to continue"));
        assert!(is_login_screen(DASHBOARD_URL, "ACESSO NEGADO"));
        assert!(is_login_screen(DASHBOARD_URL, "Something went wrong."));
        assert!(is_login_screen(DASHBOARD_URL, "Faça login para continuar"));
    }

    #[test]
    fn marker_beyond_probe_window_is_ignored() {
        let mut text = "x".repeat(TEXT_PROBE_CHARS);
        text.push_str("access denied");
        assert!(!is_login_screen(DASHBOARD_URL, &text));

        // Same marker inside the window is seen.
        let text = format!("access denied{}", "x".repeat(TEXT_PROBE_CHARS));
        assert!(is_login_screen(DASHBOARD_URL, &text));
    }
}
