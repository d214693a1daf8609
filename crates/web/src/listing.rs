//! Directory listing page.

use std::cmp::Ordering;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::debug;

use crate::html::{encode_href, encode_html, form_open, page, submit_button};
use crate::paths::Location;
use crate::settings::{SortKey, SortSettings};
use webphone_http::protocol::CHECKED;

/// One entry of a directory, as shown in the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    /// Where a symbolic link points, if the entry is one.
    pub link_target: Option<String>,
    pub size: u64,
    pub modified: SystemTime,
}

/// Reads the entries of `dir`, following symbolic links for size and date.
///
/// Entries whose metadata can't be read, such as dangling links, are listed with zero
/// size and date.
pub async fn read_entries(dir: &Path) -> io::Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();

        let is_link = entry.file_type().await.is_ok_and(|file_type| file_type.is_symlink());
        let link_target = if is_link {
            let target = match tokio::fs::canonicalize(&path).await {
                Ok(target) => Ok(target),
                Err(_) => tokio::fs::read_link(&path).await,
            };
            Some(target.map_or_else(|_| String::from("?"), |target| target.to_string_lossy().into_owned()))
        } else {
            None
        };

        let entry = match tokio::fs::metadata(&path).await {
            Ok(metadata) => DirEntry {
                name,
                is_dir: metadata.is_dir(),
                link_target,
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            },
            Err(e) => {
                debug!(path = %path.display(), cause = %e, "can't stat entry");
                DirEntry { name, is_dir: false, link_target, size: 0, modified: SystemTime::UNIX_EPOCH }
            }
        };
        entries.push(entry);
    }

    Ok(entries)
}

/// Sorts entries by the selected key. Ties fall back to the name so the order is stable
/// across requests.
pub fn sort_entries(entries: &mut [DirEntry], settings: SortSettings) {
    entries.sort_by(|a, b| {
        let ordering = match settings.key {
            SortKey::Name => compare_names(a, b),
            SortKey::Size => a.size.cmp(&b.size).then_with(|| compare_names(a, b)),
            SortKey::Date => a.modified.cmp(&b.modified).then_with(|| compare_names(a, b)),
        };
        if settings.descending { ordering.reverse() } else { ordering }
    });
}

fn compare_names(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase()).then_with(|| a.name.cmp(&b.name))
}

fn sort_label(key: SortKey) -> &'static str {
    match key {
        SortKey::Name => "name",
        SortKey::Size => "size",
        SortKey::Date => "date",
    }
}

/// A column header linking to the command that sorts by `key`.
fn sort_header(href: &str, key: SortKey, settings: SortSettings) -> String {
    let label = if key == settings.key {
        let arrow = if settings.descending { "&#8593;" } else { "&#8595;" };
        format!("{}{arrow}", sort_label(key).to_uppercase())
    } else {
        sort_label(key).to_owned()
    };

    format!("<TD><B><A HREF=\"{href}?{}\">{label}</A></B></TD>\r\n", settings.command_for(key))
}

fn format_date(modified: SystemTime) -> String {
    DateTime::<Local>::from(modified).format("%m/%d/%Y %H:%M").to_string()
}

/// Renders the listing of `location` with its upload, mkdir and selection forms.
///
/// `entries` must already be sorted.
pub fn render_listing(location: &Location, root: &Path, entries: &[DirEntry], settings: SortSettings) -> String {
    let url_path = location.url_path();
    let href = encode_href(&url_path);
    let mut body = String::with_capacity(4096 + entries.len() * 512);

    body.push_str("<STYLE>\r\nA { text-decoration: none; }\r\n</STYLE>\r\n");
    body.push_str(&format!("<B>Index of {}</B><BR>\r\n", encode_html(&url_path)));
    body.push_str(&format!("<A HREF=\"{href}\"><B>RELOAD</B></A><BR>\r\n"));
    if !location.is_root() {
        let parent = encode_href(&location.parent(root).url_path());
        body.push_str(&format!("<A HREF=\"{parent}\"><B>PARENT DIR</B></A><BR>\r\n"));
    }

    // the order of the widgets is the order of the form parts
    body.push_str(form_open());
    body.push_str("Upload files to this directory:<BR>\n");
    body.push_str("<INPUT TYPE=\"file\" NAME=\"__UPLOAD\" MULTIPLE>\n");
    body.push_str("<INPUT TYPE=\"submit\" VALUE=\"UPLOAD\" NAME=\"__UPLOAD\">\n");
    body.push_str("</FORM>\r\n");

    body.push_str(form_open());
    body.push_str("Create a directory:<BR>\n");
    body.push_str("<INPUT TYPE=\"text\" NAME=\"__MKDIRPATH\">\n");
    body.push_str(&submit_button("__MKDIR", "MAKE DIRECTORY"));
    body.push_str("</FORM>\r\n");

    body.push_str(form_open());
    body.push_str("Move the selected files to another directory:<BR>\n");
    body.push_str("<INPUT TYPE=\"text\" NAME=\"__MOVEPATH\">\n");
    body.push_str(&submit_button("__MOVE", "MOVE FILES"));
    body.push_str("<P>\n");
    body.push_str(&submit_button("__DELETE", "DELETE"));
    body.push_str(&submit_button("__RENAME", "RENAME"));
    body.push_str(&submit_button("__EDIT", "EDIT"));
    body.push_str("<BUTTON TYPE=\"button\" ONCLICK=\"selectAll()\">CHECK ALL</BUTTON>\n");

    body.push_str("<TABLE>\r\n<TR>\r\n");
    for key in [SortKey::Size, SortKey::Date, SortKey::Name] {
        body.push_str(&sort_header(&href, key, settings));
    }
    body.push_str("</TR>\r\n");

    for entry in entries {
        body.push_str(&render_entry(&url_path, entry));
    }

    body.push_str("</TABLE>\r\n</FORM>\r\n");
    body.push_str(SELECT_ALL_SCRIPT);

    page(&format!("Index of {url_path}"), &body)
}

fn render_entry(dir_url_path: &str, entry: &DirEntry) -> String {
    let name = encode_html(&entry.name);
    let entry_url_path =
        if dir_url_path == "/" { format!("/{}", entry.name) } else { format!("{dir_url_path}/{}", entry.name) };

    let mut open = String::new();
    let mut close = String::from("</A>");
    if entry.link_target.is_some() {
        open.push_str("<I>");
        close.push_str("</I>");
    }
    if entry.is_dir {
        open.push_str("<B>");
        close.insert_str(4, "</B>");
    }
    open.push_str(&format!("<A HREF=\"{}\">", encode_href(&entry_url_path)));

    let mut shown = name.to_string();
    if entry.is_dir {
        shown.push('/');
    }
    if let Some(target) = &entry.link_target {
        shown.push_str(" -> ");
        shown.push_str(&encode_html(target));
    }

    format!(
        "<TR><TD>{open}{size}{close}</TD><TD>{open}{date}{close}</TD>\
         <TD><INPUT TYPE=\"checkbox\" CLASS=\"item\" NAME=\"{name}\" VALUE=\"{CHECKED}\">{open}{shown}{close}</TD></TR>\r\n",
        size = entry.size,
        date = format_date(entry.modified),
    )
}

const SELECT_ALL_SCRIPT: &str = "<SCRIPT>\n\
    function selectAll() {\n\
        const checkboxes = document.querySelectorAll('.item');\n\
        const checked = checkboxes.length > 0 && checkboxes[0].checked;\n\
        checkboxes.forEach(checkbox => { checkbox.checked = !checked; });\n\
    }\n\
    </SCRIPT>\r\n";

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn entry(name: &str, size: u64, age_secs: u64) -> DirEntry {
        DirEntry {
            name: name.to_owned(),
            is_dir: false,
            link_target: None,
            size,
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 - age_secs),
        }
    }

    fn names(entries: &[DirEntry]) -> Vec<&str> {
        entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    #[test]
    fn sorts_by_each_key() {
        let mut entries = vec![entry("b.txt", 30, 10), entry("A.txt", 20, 30), entry("c.txt", 10, 20)];

        sort_entries(&mut entries, SortSettings { key: SortKey::Name, descending: false });
        assert_eq!(names(&entries), ["A.txt", "b.txt", "c.txt"]);

        sort_entries(&mut entries, SortSettings { key: SortKey::Name, descending: true });
        assert_eq!(names(&entries), ["c.txt", "b.txt", "A.txt"]);

        sort_entries(&mut entries, SortSettings { key: SortKey::Size, descending: false });
        assert_eq!(names(&entries), ["c.txt", "A.txt", "b.txt"]);

        sort_entries(&mut entries, SortSettings { key: SortKey::Date, descending: true });
        assert_eq!(names(&entries), ["b.txt", "c.txt", "A.txt"]);
    }

    #[test]
    fn sort_headers_mark_the_current_key() {
        let settings = SortSettings { key: SortKey::Size, descending: false };
        assert_eq!(
            sort_header("/sdcard", SortKey::Size, settings),
            "<TD><B><A HREF=\"/sdcard?sort_1_1\">SIZE&#8595;</A></B></TD>\r\n"
        );
        assert_eq!(
            sort_header("/sdcard", SortKey::Name, settings),
            "<TD><B><A HREF=\"/sdcard?sort_0_0\">name</A></B></TD>\r\n"
        );
    }

    #[test]
    fn renders_entries_with_checkboxes() {
        let root = PathBuf::from("/srv");
        let location = Location::from_request_path(&root, "/My%20Music").unwrap();
        let mut dir = entry("Live & Loud", 4096, 0);
        dir.is_dir = true;
        let entries = vec![dir, entry("café.mp3", 5, 0)];

        let html = render_listing(&location, &root, &entries, SortSettings::default());

        assert!(html.contains("<B>Index of /My Music</B>"));
        assert!(html.contains("<A HREF=\"/\"><B>PARENT DIR</B></A>"));
        assert!(html.contains("NAME=\"Live &#38; Loud\" VALUE=\"__CHECKED\""));
        assert!(html.contains("<B><A HREF=\"/My%20Music/Live%20%26%20Loud\">Live &#38; Loud/</A></B>"));
        assert!(html.contains("NAME=\"caf&#233;.mp3\" VALUE=\"__CHECKED\""));
        assert!(html.contains("<A HREF=\"/My%20Music/caf%C3%A9.mp3\">caf&#233;.mp3</A>"));
        assert!(html.contains("NAME=\"__UPLOAD\""));
        assert!(html.contains("NAME=\"__MKDIRPATH\""));
        assert!(html.contains("NAME=\"__MOVEPATH\""));
    }

    #[test]
    fn root_has_no_parent_link() {
        let root = PathBuf::from("/srv");
        let location = Location::from_request_path(&root, "/").unwrap();
        let html = render_listing(&location, &root, &[], SortSettings::default());
        assert!(!html.contains("PARENT DIR"));
    }

    #[tokio::test]
    async fn reads_files_dirs_and_links() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("photos")).unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(dir.path().join("notes.txt"), dir.path().join("link.txt")).unwrap();

        let mut entries = read_entries(dir.path()).await.unwrap();
        sort_entries(&mut entries, SortSettings::default());

        let notes = entries.iter().find(|entry| entry.name == "notes.txt").unwrap();
        assert_eq!(notes.size, 5);
        assert!(!notes.is_dir);
        assert!(notes.link_target.is_none());

        let photos = entries.iter().find(|entry| entry.name == "photos").unwrap();
        assert!(photos.is_dir);

        #[cfg(unix)]
        {
            let link = entries.iter().find(|entry| entry.name == "link.txt").unwrap();
            assert_eq!(link.size, 5);
            assert!(link.link_target.as_deref().unwrap().ends_with("notes.txt"));
        }
    }
}
