// src/utils/html.rs

/// Sanitises student answers and instructor feedback before they are stored.
///
/// Whitelist based: formatting tags such as <b> or <p> survive, <script>,
/// <iframe> and event-handler attributes are removed together with their content.
/// Both texts are rendered to the other party, so this is the stored-XSS guard.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
