use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based sanitization: safe tags (<b>, <p>, ...) survive, dangerous
/// tags (<script>, <iframe>) and attributes (onclick) are stripped. Post
/// bodies arrive as rich-editor HTML and comments may contain pasted markup,
/// so everything user-supplied goes through here before storage.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
