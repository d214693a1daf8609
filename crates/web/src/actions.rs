//! The file manager's POST actions.
//!
//! Every page posts back to the directory it shows. Which action a form asks for is told
//! by the name of the submit button that was pressed: the first marker found in
//! [`MARKERS`] order wins, and a form without any marker just shows the listing.

use std::path::Path;

use tracing::info;
use webphone_http::protocol::Form;

use crate::error::ActionError;
use crate::html::{encode_html, form_open, hidden_checked, page, submit_button};
use crate::listing::{read_entries, render_listing, sort_entries};
use crate::paths::{Location, upload_name};
use crate::responder::Html;
use crate::settings::SortSettings;

/// Largest file the editor opens.
pub const MAX_EDIT_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Upload,
    ConfirmDelete,
    Delete,
    ConfirmMove,
    Move,
    ConfirmRename,
    Rename,
    Mkdir,
    Edit,
    EditSave,
    List,
}

/// Action markers in the order they are looked for.
pub const MARKERS: [(&str, Action); 14] = [
    ("__UPLOAD", Action::Upload),
    ("__DELETE", Action::ConfirmDelete),
    ("__CONFIRMDELETE", Action::Delete),
    ("__MOVE", Action::ConfirmMove),
    ("__CONFIRMMOVE", Action::Move),
    ("__RENAME", Action::ConfirmRename),
    ("__CONFIRMRENAME", Action::Rename),
    ("__MKDIR", Action::Mkdir),
    ("__EDIT", Action::Edit),
    ("__EDITSAVE", Action::EditSave),
    ("__ABORTDELETE", Action::List),
    ("__ABORTRENAME", Action::List),
    ("__ABORTMOVE", Action::List),
    ("__EDITQUIT", Action::List),
];

impl Action {
    pub fn from_form(form: &Form) -> Self {
        MARKERS.iter().find(|(marker, _)| form.contains(marker)).map_or(Action::List, |(_, action)| *action)
    }
}

/// The directory a request was sent to.
#[derive(Debug, Clone, Copy)]
pub struct Directory<'a> {
    pub root: &'a Path,
    pub location: &'a Location,
    pub sort: SortSettings,
}

impl Directory<'_> {
    /// Runs `action` with the submitted `form`, returning the page to show next.
    pub async fn run(&self, action: Action, mut form: Form) -> Result<Html, ActionError> {
        match action {
            Action::Upload => self.upload(&mut form).await,
            Action::ConfirmDelete => self.confirm_delete(&form),
            Action::Delete => self.delete(&form).await,
            Action::ConfirmMove => self.confirm_move(&form),
            Action::Move => self.move_files(&form).await,
            Action::ConfirmRename => self.confirm_rename(&form),
            Action::Rename => self.rename(&form).await,
            Action::Mkdir => self.mkdir(&form).await,
            Action::Edit => self.edit(&form, None).await,
            Action::EditSave => self.edit_save(&form).await,
            Action::List => self.listing().await,
        }
    }

    pub async fn listing(&self) -> Result<Html, ActionError> {
        let dir = self.location.fs_path();
        let mut entries = read_entries(dir).await.map_err(|e| ActionError::io("list", dir, e))?;
        sort_entries(&mut entries, self.sort);
        Ok(Html(render_listing(self.location, self.root, &entries, self.sort)))
    }

    /// Moves every spooled upload into this directory under its own name.
    async fn upload(&self, form: &mut Form) -> Result<Html, ActionError> {
        for upload in form.take_uploads() {
            let target = self.location.child(upload_name(upload.filename()))?;
            let size = upload.size();
            upload.persist(&target).await.map_err(|e| ActionError::io("store upload as", &target, e))?;
            info!(path = %target.display(), size, "stored upload");
        }
        self.listing().await
    }

    fn confirm_delete(&self, form: &Form) -> Result<Html, ActionError> {
        let selected = selection(form)?;

        let mut body = format!("<B>Really delete the following files in {}?</B><P>\r\n", self.shown_path());
        push_names(&mut body, selected);
        body.push_str(form_open());
        // the buttons go first so they are the first form parts
        body.push_str(&submit_button("__CONFIRMDELETE", "DELETE"));
        body.push_str(&submit_button("__ABORTDELETE", "DON'T DELETE"));
        push_hidden_selection(&mut body, selected);
        body.push_str("</FORM>\r\n");

        Ok(Html(page("Delete files", &body)))
    }

    /// Deletes files and empty directories, stopping at the first failure.
    async fn delete(&self, form: &Form) -> Result<Html, ActionError> {
        for name in selection(form)? {
            let path = self.location.child(name)?;
            let metadata = tokio::fs::symlink_metadata(&path).await.map_err(|e| ActionError::io("delete", &path, e))?;

            let removed =
                if metadata.is_dir() { tokio::fs::remove_dir(&path).await } else { tokio::fs::remove_file(&path).await };
            removed.map_err(|e| ActionError::io("delete", &path, e))?;
            info!(path = %path.display(), "deleted");
        }
        self.listing().await
    }

    fn confirm_move(&self, form: &Form) -> Result<Html, ActionError> {
        let selected = selection(form)?;
        let target = self.location.resolve(self.root, form.get("__MOVEPATH").unwrap_or_default())?;
        let target_path = encode_html(&target.url_path()).into_owned();

        let mut body = format!("<B>Really move the following files to {target_path}?</B><P>\r\n");
        push_names(&mut body, selected);
        body.push_str(form_open());
        body.push_str(&submit_button("__CONFIRMMOVE", "MOVE"));
        body.push_str(&submit_button("__ABORTMOVE", "DON'T MOVE"));
        body.push_str(&format!("<INPUT TYPE=\"hidden\" NAME=\"__MOVEPATH\" VALUE=\"{target_path}\">\r\n"));
        push_hidden_selection(&mut body, selected);
        body.push_str("</FORM>\r\n");

        Ok(Html(page("Move files", &body)))
    }

    /// Moves the selected entries into `__MOVEPATH`, refusing to overwrite anything.
    async fn move_files(&self, form: &Form) -> Result<Html, ActionError> {
        let target = self.location.resolve(self.root, form.get("__MOVEPATH").unwrap_or_default())?;

        for name in selection(form)? {
            let from = self.location.child(name)?;
            let to = target.child(name)?;
            if from == to {
                continue;
            }

            rename_new(&from, &to, "move").await?;
            info!(from = %from.display(), to = %to.display(), "moved");
        }
        self.listing().await
    }

    fn confirm_rename(&self, form: &Form) -> Result<Html, ActionError> {
        let selected = selection(form)?;

        let mut body = String::from("<STYLE>\r\n.full-width { width: 100%; }\r\n</STYLE>\r\n");
        body.push_str(&format!("<B>Rename the following files in {}?</B><P>\r\n", self.shown_path()));
        body.push_str(form_open());
        body.push_str(&submit_button("__CONFIRMRENAME", "RENAME"));
        body.push_str(&submit_button("__ABORTRENAME", "DON'T RENAME"));
        body.push_str("<P>\r\n");
        for name in selected {
            let name = encode_html(name);
            body.push_str(&format!(
                "{name} -> <BR><INPUT TYPE=\"text\" CLASS=\"full-width\" NAME=\"{name}\" VALUE=\"{name}\"><BR>\r\n"
            ));
        }
        push_hidden_selection(&mut body, selected);
        body.push_str("</FORM>\r\n");

        Ok(Html(page("Rename files", &body)))
    }

    /// Renames each selected entry to the value submitted under its old name.
    async fn rename(&self, form: &Form) -> Result<Html, ActionError> {
        for old_name in selection(form)? {
            let new_name = form.get(old_name).ok_or_else(|| ActionError::MissingNewName(old_name.clone()))?;
            if new_name == old_name {
                continue;
            }

            let from = self.location.child(old_name)?;
            let to = self.location.child(new_name)?;
            rename_new(&from, &to, "rename").await?;
            info!(from = %from.display(), to = %to.display(), "renamed");
        }
        self.listing().await
    }

    async fn mkdir(&self, form: &Form) -> Result<Html, ActionError> {
        let name = form.get("__MKDIRPATH").filter(|name| !name.trim().is_empty()).ok_or(ActionError::MissingName)?;
        let target = self.location.resolve(self.root, name)?;
        let path = target.fs_path();

        tokio::fs::create_dir(path).await.map_err(|e| ActionError::io("create the directory", path, e))?;
        info!(path = %path.display(), "created directory");
        self.listing().await
    }

    /// Shows the first selected file in a text editor, with the size just written when
    /// coming back from a save.
    async fn edit(&self, form: &Form, written: Option<u64>) -> Result<Html, ActionError> {
        let name = selection(form)?.first().ok_or(ActionError::NothingSelected)?;
        let path = self.location.child(name)?;

        let metadata = tokio::fs::metadata(&path).await.map_err(|e| ActionError::io("open", &path, e))?;
        if metadata.len() > MAX_EDIT_BYTES {
            let path = path.display().to_string();
            return Err(ActionError::TooLarge { path, size: metadata.len(), max: MAX_EDIT_BYTES });
        }
        let content = tokio::fs::read(&path).await.map_err(|e| ActionError::io("read", &path, e))?;
        let text = String::from_utf8_lossy(&content);

        let mut body = String::from(EDITOR_HEAD);
        body.push_str("<FORM CLASS=\"container\" METHOD=\"post\" ENCTYPE=\"multipart/form-data\">\r\n<DIV>\r\n");
        body.push_str(&format!("<B>Editing {}</B><BR>\r\n", encode_html(&path.display().to_string())));
        body.push_str("CR's have been stripped<BR>\r\n");
        if let Some(written) = written {
            body.push_str(&format!("{written} bytes written<BR>\r\n"));
        }
        body.push_str(&submit_button("__EDITSAVE", "SAVE"));
        body.push_str("</DIV>\r\n");
        // a newline right after the start tag is dropped by the browser
        body.push_str("<TEXTAREA ID=\"text\" NAME=\"__EDITTEXT\" ONSCROLL=\"saveScrollPosition()\">\r\n");
        body.push_str(&encode_html(&text));
        body.push_str("</TEXTAREA>\r\n<DIV>\r\n");
        body.push_str(&submit_button("__EDITQUIT", "QUIT"));
        body.push_str(&hidden_checked(name));
        body.push_str("</DIV>\r\n</FORM>\r\n");

        Ok(Html(page(&format!("Editing {name}"), &body)))
    }

    async fn edit_save(&self, form: &Form) -> Result<Html, ActionError> {
        let name = selection(form)?.first().ok_or(ActionError::NothingSelected)?;
        let path = self.location.child(name)?;
        let text = form.get("__EDITTEXT").unwrap_or_default();

        tokio::fs::write(&path, text).await.map_err(|e| ActionError::io("write", &path, e))?;
        let written = tokio::fs::metadata(&path).await.map_err(|e| ActionError::io("write", &path, e))?.len();
        info!(path = %path.display(), written, "saved edited file");

        self.edit(form, Some(written)).await
    }

    fn shown_path(&self) -> String {
        encode_html(&self.location.url_path()).into_owned()
    }
}

/// The names submitted as selected; an action on a selection needs at least one.
fn selection(form: &Form) -> Result<&[String], ActionError> {
    match form.checked() {
        [] => Err(ActionError::NothingSelected),
        selected => Ok(selected),
    }
}

fn push_names(body: &mut String, names: &[String]) {
    for name in names {
        body.push_str(&format!("{}<BR>\r\n", encode_html(name)));
    }
    body.push_str("<P>\r\n");
}

/// Resubmits the selection with the next form.
fn push_hidden_selection(body: &mut String, names: &[String]) {
    for name in names {
        body.push_str(&hidden_checked(name));
    }
}

/// Renames `from` to `to` unless `to` already exists.
async fn rename_new(from: &Path, to: &Path, action: &'static str) -> Result<(), ActionError> {
    if tokio::fs::try_exists(to).await.map_err(|e| ActionError::io(action, to, e))? {
        return Err(ActionError::AlreadyExists(to.display().to_string()));
    }
    tokio::fs::rename(from, to).await.map_err(|e| ActionError::io(action, from, e))
}

const EDITOR_HEAD: &str = "<STYLE>\n\
    html, body { height: 100%; margin: 0; padding: 0; }\n\
    .container { display: flex; flex-direction: column; height: 100%; }\n\
    textarea { flex: 1; resize: none; width: 100%; box-sizing: border-box; white-space: pre; }\n\
    </STYLE>\n\
    <SCRIPT>\n\
    function saveScrollPosition() {\n\
        sessionStorage.setItem('scrollPosition', document.getElementById('text').scrollTop);\n\
    }\n\
    window.onload = function() {\n\
        const scrollPosition = sessionStorage.getItem('scrollPosition');\n\
        if (scrollPosition !== null) document.getElementById('text').scrollTop = scrollPosition;\n\
    };\n\
    </SCRIPT>\n";
