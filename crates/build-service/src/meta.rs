//! XML documents exchanged with the build service.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::Deserialize;
use workflow::BackendError;

/// `<project>` meta document; only the fields the engine reads.
#[derive(Debug, Deserialize)]
pub(crate) struct ProjectMeta {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(default)]
    pub scmsync: Option<String>,
    #[serde(rename = "repository", default)]
    pub repositories: Vec<RepositoryMeta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepositoryMeta {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "arch", default)]
    pub archs: Vec<String>,
}

/// `<package>` meta document.
#[derive(Debug, Deserialize)]
pub(crate) struct PackageMeta {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@project")]
    pub project: String,
    #[serde(default)]
    pub scmsync: Option<String>,
}

/// `<status>` document returned with most error responses.
#[derive(Debug, Deserialize)]
pub(crate) struct Status {
    #[serde(rename = "@code")]
    pub code: String,
    #[serde(default)]
    pub summary: Option<String>,
}

impl Status {
    pub fn parse(body: &str) -> Option<Self> {
        quick_xml::de::from_str(body).ok()
    }

    /// Summary if present, the code otherwise.
    pub fn message(&self) -> String {
        self.summary
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| self.code.clone())
    }
}

pub(crate) fn parse<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, BackendError> {
    quick_xml::de::from_str(body).map_err(|e| BackendError::InvalidResponse {
        message: format!("invalid meta document: {e}"),
    })
}

fn invalid(e: impl std::fmt::Display) -> BackendError {
    BackendError::InvalidResponse {
        message: format!("cannot rewrite meta document: {e}"),
    }
}

/// Sets the top-level `<scmsync>` of a meta document to `url`.
///
/// Everything else is written back unchanged. A document without `<scmsync>`
/// gets one appended as the last child of the root element; a self-closing
/// root is expanded to hold it.
pub(crate) fn replace_scmsync(meta: &str, url: &str) -> Result<String, BackendError> {
    let mut reader = Reader::from_str(meta);
    let mut writer = Writer::new(Vec::new());
    let mut depth = 0usize;
    let mut replaced = false;
    let mut skipping = false;

    loop {
        let event = reader.read_event().map_err(invalid)?;
        match event {
            Event::Eof => break,
            _ if skipping => {
                if matches!(&event, Event::End(e) if e.name().as_ref() == b"scmsync") {
                    skipping = false;
                    writer
                        .write_event(Event::End(BytesEnd::new("scmsync")))
                        .map_err(invalid)?;
                    depth -= 1;
                }
            }
            Event::Start(e) if depth == 1 && e.name().as_ref() == b"scmsync" => {
                writer.write_event(Event::Start(e)).map_err(invalid)?;
                writer
                    .write_event(Event::Text(BytesText::new(url)))
                    .map_err(invalid)?;
                replaced = true;
                skipping = true;
                depth += 1;
            }
            Event::Empty(e) if depth == 1 && e.name().as_ref() == b"scmsync" => {
                write_scmsync(&mut writer, url)?;
                replaced = true;
            }
            Event::Empty(e) if depth == 0 => {
                let end = e.to_end().into_owned();
                writer.write_event(Event::Start(e)).map_err(invalid)?;
                write_scmsync(&mut writer, url)?;
                writer.write_event(Event::End(end)).map_err(invalid)?;
                replaced = true;
            }
            Event::Start(e) => {
                depth += 1;
                writer.write_event(Event::Start(e)).map_err(invalid)?;
            }
            Event::End(e) => {
                if depth == 1 && !replaced {
                    write_scmsync(&mut writer, url)?;
                    replaced = true;
                }
                depth = depth.saturating_sub(1);
                writer.write_event(Event::End(e)).map_err(invalid)?;
            }
            other => writer.write_event(other).map_err(invalid)?,
        }
    }

    if !replaced {
        return Err(invalid("no root element"));
    }
    String::from_utf8(writer.into_inner()).map_err(invalid)
}

/// Meta document for a project that receives branched packages of
/// `source_project`. Each repository builds against the source repository of
/// the same name.
pub(crate) fn branch_project_meta(
    name: &str,
    source_project: &str,
    repositories: &[RepositoryMeta],
) -> Result<String, BackendError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Start(
            BytesStart::new("project").with_attributes([("name", name)]),
        ))
        .map_err(invalid)?;
    write_empty_title_and_description(&mut writer)?;
    for repository in repositories {
        let repository_name = repository.name.as_str();
        writer
            .write_event(Event::Start(
                BytesStart::new("repository").with_attributes([("name", repository_name)]),
            ))
            .map_err(invalid)?;
        writer
            .write_event(Event::Empty(BytesStart::new("path").with_attributes([
                ("project", source_project),
                ("repository", repository_name),
            ])))
            .map_err(invalid)?;
        for arch in &repository.archs {
            writer
                .write_event(Event::Start(BytesStart::new("arch")))
                .map_err(invalid)?;
            writer
                .write_event(Event::Text(BytesText::new(arch)))
                .map_err(invalid)?;
            writer
                .write_event(Event::End(BytesEnd::new("arch")))
                .map_err(invalid)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new("repository")))
            .map_err(invalid)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("project")))
        .map_err(invalid)?;
    String::from_utf8(writer.into_inner()).map_err(invalid)
}

/// Meta document for a package without sources.
pub(crate) fn empty_package_meta(project: &str, name: &str) -> Result<String, BackendError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Start(
            BytesStart::new("package").with_attributes([("name", name), ("project", project)]),
        ))
        .map_err(invalid)?;
    write_empty_title_and_description(&mut writer)?;
    writer
        .write_event(Event::End(BytesEnd::new("package")))
        .map_err(invalid)?;
    String::from_utf8(writer.into_inner()).map_err(invalid)
}

fn write_empty_title_and_description(writer: &mut Writer<Vec<u8>>) -> Result<(), BackendError> {
    for element in ["title", "description"] {
        writer
            .write_event(Event::Empty(BytesStart::new(element)))
            .map_err(invalid)?;
    }
    Ok(())
}

fn write_scmsync(writer: &mut Writer<Vec<u8>>, url: &str) -> Result<(), BackendError> {
    writer
        .write_event(Event::Start(BytesStart::new("scmsync")))
        .map_err(invalid)?;
    writer
        .write_event(Event::Text(BytesText::new(url)))
        .map_err(invalid)?;
    writer
        .write_event(Event::End(BytesEnd::new("scmsync")))
        .map_err(invalid)
}
