use crate::{resolve::percent_encode, traits::HumanSize};
use html_escape::{encode_double_quoted_attribute, encode_text};
use natord::compare_ignore_case;
use std::{
    fs::read_dir,
    io::{self, Cursor},
    path::Path,
};
use tiny_http::{Header, Response};

pub struct Entry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

pub struct Listing {
    url_path: String,
    entries: Vec<Entry>,
}

impl Listing {
    pub fn read(dir: &Path, url_path: &str) -> io::Result<Self> {
        let mut entries = vec![];

        for entry in read_dir(dir)? {
            let Ok(entry) = entry else { continue };
            let Ok(metadata) = entry.metadata() else {
                continue;
            };

            entries.push(Entry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: metadata.is_dir(),
                size: metadata.len(),
            });
        }

        entries.sort_by(|a, b| {
            b.is_dir
                .cmp(&a.is_dir)
                .then_with(|| compare_ignore_case(&a.name, &b.name))
        });

        Ok(Self {
            url_path: url_path.into(),
            entries,
        })
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn to_html(&self) -> String {
        let title = format!("Directory listing for {}", encode_text(&self.url_path));

        let mut entry_elements = String::new();

        if self.url_path != "/" {
            entry_elements += r#"<li><a href="../">../</a></li>"#;
        }

        for entry in &self.entries {
            let suffix = if entry.is_dir { "/" } else { "" };
            let href = format!("{}{suffix}", percent_encode(&entry.name));
            let size = if entry.is_dir {
                String::new()
            } else {
                entry.size.human_size()
            };

            entry_elements += &format!(
                r#"<li><a href="{}">{}{suffix}</a><span class="size">{size}</span></li>"#,
                encode_double_quoted_attribute(&href),
                encode_text(&entry.name),
            );
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>{title}</title>
        <style>
            body {{
                font-family: Segoe UI, Arial, Helvetica, sans-serif;
                margin: 20px;
            }}

            li {{
                display: flex;
                gap: 20px;
                padding: 2px 0;
            }}

            .size {{
                color: #777;
            }}
        </style>
    </head>
    <body>
        <h1>{title}</h1>
        <hr />
        <ul>{entry_elements}</ul>
        <hr />
    </body>
</html>
"#
        )
    }
}

impl From<Listing> for Response<Cursor<Vec<u8>>> {
    fn from(value: Listing) -> Self {
        let mut response = Response::from_string(value.to_html());

        if let Ok(header) = Header::from_bytes("Content-Type", "text/html; charset=utf-8") {
            response = response.with_header(header);
        }

        response
    }
}
