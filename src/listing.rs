use crate::error::AppError;
use crate::templates::Template;
use crate::utils::{html_escape, os_str_bytes, percent_decode, percent_encode, strip_query};
use log::debug;
use std::ffi::OsString;
use std::fs;
use std::path::Path;

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: OsString,
    pub is_directory: bool,
}

impl ListingEntry {
    /// Percent-encoded link target; directories get a trailing slash.
    pub fn href(&self) -> String {
        let mut link = percent_encode(&os_str_bytes(&self.name));
        if self.is_directory {
            link.push('/');
        }
        link
    }

    pub fn label(&self) -> String {
        html_escape(&self.name.to_string_lossy())
    }
}

/// Reads the entries of `dir`. Any failure to read it surfaces as
/// `ListingForbidden`.
pub fn read_entries(dir: &Path) -> Result<Vec<ListingEntry>, AppError> {
    let read_dir = fs::read_dir(dir).map_err(|e| {
        debug!("Can't list '{}': {e}", dir.display());
        AppError::ListingForbidden
    })?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|_| AppError::ListingForbidden)?;
        entries.push(ListingEntry {
            is_directory: entry.path().is_dir(),
            name: entry.file_name(),
        });
    }
    Ok(entries)
}

/// Case-insensitive ascending order by name.
pub fn sort_entries(entries: &mut [ListingEntry]) {
    entries.sort_by_cached_key(|entry| entry.name.to_string_lossy().to_lowercase());
}

/// The `<li>` markup substituted for `{{ files }}`.
pub fn render_file_items(entries: &[ListingEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            format!(
                r#"<li><a class="file-button" href="{}">{}</a></li>"#,
                entry.href(),
                entry.label()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders the listing page for `dir`, returning the UTF-8 body.
///
/// `request_path` is the request target as sent by the client (still
/// percent-encoded); it is decoded and escaped for display.
pub fn generate_directory_listing(
    dir: &Path,
    request_path: &str,
    template_path: &Path,
    hosted_root: &Path,
) -> Result<Vec<u8>, AppError> {
    debug!("Generating directory listing for: '{}'", dir.display());

    let mut entries = read_entries(dir)?;
    sort_entries(&mut entries);

    let display_path = html_escape(&String::from_utf8_lossy(&percent_decode(strip_query(
        request_path,
    ))));
    let hosted_directory = hosted_root
        .file_name()
        .map(|name| html_escape(&name.to_string_lossy()))
        .unwrap_or_default();

    let template = Template::load(template_path)?;

    Ok(template
        .render(&[
            ("path", display_path),
            ("files", render_file_items(&entries)),
            ("hosted_directory", hosted_directory),
        ])
        .into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(name: &str, is_directory: bool) -> ListingEntry {
        ListingEntry {
            name: OsString::from(name),
            is_directory,
        }
    }

    #[test]
    fn test_sort_is_case_insensitive() {
        let mut entries = vec![entry("B.txt", false), entry("a.txt", false), entry("C", true)];
        sort_entries(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| e.name.to_string_lossy().into_owned()).collect();
        assert_eq!(names, ["a.txt", "B.txt", "C"]);
    }

    #[test]
    fn test_items_encode_links_and_escape_labels() {
        let entries = vec![entry("my docs", true), entry("a<b>&c.txt", false)];
        let html = render_file_items(&entries);
        assert_eq!(
            html,
            "<li><a class=\"file-button\" href=\"my%20docs/\">my docs</a></li>\n\
             <li><a class=\"file-button\" href=\"a%3Cb%3E%26c.txt\">a&lt;b&gt;&amp;c.txt</a></li>"
        );
    }

    #[test]
    fn test_generate_directory_listing() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("Files");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("b.txt"), b"b").unwrap();
        fs::write(root.join("A.txt"), b"a").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        let template_path = dir.path().join("index.html");
        fs::write(
            &template_path,
            "<h1>{{ hosted_directory }}</h1><p>{{ path }}</p><ul>{{ files }}</ul>",
        )
        .unwrap();

        let body = generate_directory_listing(&root, "/a%20%3Cdir%3E/", &template_path, &root).unwrap();
        let html = String::from_utf8(body).unwrap();

        assert!(html.starts_with("<h1>Files</h1><p>/a &lt;dir&gt;/</p>"));
        let a = html.find("href=\"A.txt\"").unwrap();
        let b = html.find("href=\"b.txt\"").unwrap();
        let sub = html.find("href=\"sub/\">sub</a>").unwrap();
        assert!(a < b && b < sub);
    }

    #[test]
    fn test_missing_template_and_unreadable_dir() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.html");
        assert!(matches!(
            generate_directory_listing(dir.path(), "/", &missing, dir.path()),
            Err(AppError::TemplateMissing(_))
        ));
        assert!(matches!(
            generate_directory_listing(&dir.path().join("gone"), "/gone/", &missing, dir.path()),
            Err(AppError::ListingForbidden)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_link_losslessly() {
        use std::os::unix::ffi::OsStringExt;
        let name = OsString::from_vec(vec![b'f', 0xff, b'.', b'b']);
        let item = ListingEntry {
            name,
            is_directory: false,
        };
        assert_eq!(item.href(), "f%FF.b");
        assert_eq!(item.label(), "f\u{fffd}.b");
    }
}
