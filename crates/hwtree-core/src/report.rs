//! Report rendering: XML markup and JSON
//!
//! The XML shape is what report viewers and diffing tools consume, so the
//! presence rules matter: empty attributes produce no element, and units on
//! `size` and `capacity` are chosen by device class.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;
use tracing::debug;

use crate::env::{OutputOption, ReportContext};
use crate::node::DeviceNode;

/// Placeholder written instead of serial numbers when sanitizing
pub const REMOVED: &str = "[REMOVED]";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write XML: {0}")]
    WriteError(String),
    #[error("Report is not valid UTF-8: {0}")]
    EncodingError(#[from] std::string::FromUtf8Error),
    #[error("Failed to serialize JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl DeviceNode {
    /// Render the whole tree as a standalone XML document
    pub fn to_xml(&self, ctx: &dyn ReportContext) -> Result<String, ReportError> {
        self.render_xml(0, ctx)
    }

    /// Render this node and its subtree at `level`.
    ///
    /// Level 0 adds the document envelope: declaration, banner and host
    /// comments, and the `<list>` wrapper when that option is on.
    pub fn render_xml(&self, level: usize, ctx: &dyn ReportContext) -> Result<String, ReportError> {
        let mut out = XmlOut::new();
        let list = level == 0 && ctx.is_option_enabled(OutputOption::List);

        if level == 0 {
            out.envelope(ctx)?;
            if list {
                debug!(option = OutputOption::List.name(), "Wrapping report in list element");
                out.line(0, Event::Start(BytesStart::new("list")))?;
            }
        }

        out.node(self, level, ctx)?;

        if list {
            out.line(0, Event::End(BytesEnd::new("list")))?;
        }

        out.finish()
    }

    /// Render the tree as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn finish(self) -> Result<String, ReportError> {
        Ok(String::from_utf8(self.writer.into_inner())?)
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), ReportError> {
        self.writer
            .write_event(event)
            .map_err(|e| ReportError::WriteError(e.to_string()))
    }

    /// One event on its own line, indented two spaces per depth
    fn line(&mut self, depth: usize, event: Event<'_>) -> Result<(), ReportError> {
        let buf = self.writer.get_mut();
        buf.extend(std::iter::repeat(b' ').take(2 * depth));
        self.write(event)?;
        self.writer.get_mut().push(b'\n');
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<(), ReportError> {
        let text = format!(" {} ", escape_comment(text));
        self.line(0, Event::Comment(BytesText::from_escaped(text)))
    }

    /// `<name attrs>text</name>` on one line
    fn element(&mut self, depth: usize, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<(), ReportError> {
        let buf = self.writer.get_mut();
        buf.extend(std::iter::repeat(b' ').take(2 * depth));
        self.write(Event::Start(BytesStart::new(name).with_attributes(attrs.iter().copied())))?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.write(Event::End(BytesEnd::new(name)))?;
        self.writer.get_mut().push(b'\n');
        Ok(())
    }

    fn text_field(&mut self, depth: usize, name: &str, value: &str) -> Result<(), ReportError> {
        if value.is_empty() {
            return Ok(());
        }
        self.element(depth, name, &[], value)
    }

    fn number_field(&mut self, depth: usize, name: &str, value: u64, units: Option<&str>) -> Result<(), ReportError> {
        if value == 0 {
            return Ok(());
        }
        let text = value.to_string();
        match units {
            Some(units) => self.element(depth, name, &[("units", units)], &text),
            None => self.element(depth, name, &[], &text),
        }
    }

    fn envelope(&mut self, ctx: &dyn ReportContext) -> Result<(), ReportError> {
        self.line(0, Event::Decl(BytesDecl::new("1.0", None, Some("yes"))))?;
        self.comment(&format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")))?;
        if let Some(os) = ctx.os_identification() {
            self.comment(&os)?;
        }
        if !ctx.is_privileged() {
            self.comment("WARNING: not running as root")?;
        }
        Ok(())
    }

    fn node(&mut self, node: &DeviceNode, level: usize, ctx: &dyn ReportContext) -> Result<(), ReportError> {
        let visible = ctx.is_class_visible(node.class());
        let depth = level + 1;

        if visible {
            let start = BytesStart::new("node").with_attributes([
                ("id", node.id()),
                ("class", node.class_name()),
                ("handle", node.handle()),
            ]);
            self.line(depth, Event::Start(start))?;
            self.fields(node, depth + 1, ctx)?;
        }

        for child in node.children() {
            self.node(child, level + 1, ctx)?;
        }

        if visible {
            self.line(depth, Event::End(BytesEnd::new("node")))?;
        }
        Ok(())
    }

    fn fields(&mut self, node: &DeviceNode, depth: usize, ctx: &dyn ReportContext) -> Result<(), ReportError> {
        self.text_field(depth, "description", node.description())?;
        self.text_field(depth, "product", node.product())?;
        self.text_field(depth, "vendor", node.vendor())?;
        self.text_field(depth, "businfo", node.bus_info())?;
        for name in node.logical_names() {
            self.text_field(depth, "logicalname", name)?;
        }
        self.text_field(depth, "dev", node.dev())?;
        self.text_field(depth, "version", node.version())?;
        self.text_field(depth, "date", node.date())?;
        if !node.serial().is_empty() {
            let serial = if ctx.is_option_enabled(OutputOption::Sanitize) {
                debug!(node = %node.id(), option = OutputOption::Sanitize.name(), "Serial redacted");
                REMOVED
            } else {
                node.serial()
            };
            self.element(depth, "serial", &[], serial)?;
        }
        self.text_field(depth, "slot", node.slot())?;

        let class = node.class();
        self.number_field(depth, "size", node.size(), class.size_units())?;
        self.number_field(depth, "capacity", node.capacity(), class.capacity_units())?;
        self.number_field(depth, "width", u64::from(node.width()), Some("bits"))?;
        self.number_field(depth, "clock", node.clock(), Some("Hz"))?;

        let mut settings = node.config_keys().peekable();
        if settings.peek().is_some() {
            self.line(depth, Event::Start(BytesStart::new("configuration")))?;
            for key in settings {
                let setting = BytesStart::new("setting").with_attributes([("id", key), ("value", node.config(key))]);
                self.line(depth + 1, Event::Empty(setting))?;
            }
            self.line(depth, Event::End(BytesEnd::new("configuration")))?;
        }

        if !node.capabilities_list().is_empty() {
            self.line(depth, Event::Start(BytesStart::new("capabilities")))?;
            for capability in node.capabilities_list() {
                let description = node.capability_description(capability);
                if description.is_empty() {
                    let empty = BytesStart::new("capability").with_attributes([("id", capability.as_str())]);
                    self.line(depth + 1, Event::Empty(empty))?;
                } else {
                    self.element(depth + 1, "capability", &[("id", capability.as_str())], description)?;
                }
            }
            self.line(depth, Event::End(BytesEnd::new("capabilities")))?;
        }

        Ok(())
    }
}

/// XML comments may not contain `--`
fn escape_comment(text: &str) -> String {
    let mut out = text.to_string();
    while out.contains("--") {
        out = out.replace("--", "- -");
    }
    out
}
