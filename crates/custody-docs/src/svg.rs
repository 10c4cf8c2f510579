//! Shared SVG sheet layout used by every SVG renderer.

use crate::meta::embed_meta;
use crate::xml::{escape_xml, wrap_text};

const WIDTH: u32 = 900;
const MIN_HEIGHT: u32 = 600;
const ROW_GAP: u32 = 40;
const LINE_GAP: u32 = 24;
const VALUE_X: u32 = 220;
const NOTE_WIDTH: usize = 90;

/// A labelled sheet of rows, rendered top to bottom.
pub(crate) struct Sheet {
    body: String,
    y: u32,
}

impl Sheet {
    pub(crate) fn new() -> Self {
        Self {
            body: String::new(),
            y: 0,
        }
    }

    /// One `label: value` row.
    pub(crate) fn field(&mut self, label: &str, value: &str) -> &mut Self {
        self.body.push_str(&format!(
            "    <text class=\"label\" x=\"0\" y=\"{y}\">{label}</text>\n    <text class=\"value\" x=\"{VALUE_X}\" y=\"{y}\">{value}</text>\n",
            y = self.y,
            label = escape_xml(label),
            value = escape_xml(value),
        ));
        self.y += ROW_GAP;
        self
    }

    /// A label followed by pre-wrapped value lines.
    pub(crate) fn block(&mut self, label: &str, lines: &[String]) -> &mut Self {
        if lines.is_empty() {
            return self.field(label, "");
        }
        self.body.push_str(&format!(
            "    <text class=\"label\" x=\"0\" y=\"{}\">{}</text>\n    <text class=\"value\" x=\"{VALUE_X}\" y=\"{}\">",
            self.y,
            escape_xml(label),
            self.y,
        ));
        for (i, line) in lines.iter().enumerate() {
            let dy = if i == 0 { 0 } else { LINE_GAP };
            self.body.push_str(&format!(
                "<tspan x=\"{VALUE_X}\" dy=\"{dy}\">{}</tspan>",
                escape_xml(line)
            ));
        }
        self.body.push_str("</text>\n");
        let used = LINE_GAP * (lines.len() as u32 - 1);
        self.y += used + ROW_GAP;
        self
    }

    /// Small explanatory paragraph spanning the sheet width.
    pub(crate) fn note(&mut self, text: &str) -> &mut Self {
        for line in wrap_text(text, NOTE_WIDTH) {
            self.body.push_str(&format!(
                "    <text class=\"note\" x=\"0\" y=\"{}\">{}</text>\n",
                self.y,
                escape_xml(&line)
            ));
            self.y += LINE_GAP - 4;
        }
        self.y += ROW_GAP / 2;
        self
    }

    /// Wrap the rows in the full document: XML declaration, metadata
    /// comment, frame and title.
    pub(crate) fn finish(&self, sku: &str, serial: &str, title: &str) -> String {
        let height = (self.y + 200).max(MIN_HEIGHT);
        format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
{meta}
<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{height}">
  <defs>
    <style>
      .title{{font: 700 34px sans-serif; fill:#1f2937}}
      .label{{font: 600 18px sans-serif; fill:#4b5563}}
      .value{{font: 400 20px ui-monospace, Menlo, monospace; fill:#111827}}
      .note{{font: 400 14px sans-serif; fill:#374151}}
    </style>
  </defs>
  <rect width="100%" height="100%" fill="#f8fafc"/>
  <rect x="20" y="20" width="{inner_w}" height="{inner_h}" rx="12" ry="12" fill="#ffffff" stroke="#cbd5e1" stroke-width="3"/>
  <text x="50" y="75" class="title">{title}</text>
  <g transform="translate(50,130)">
{body}  </g>
</svg>
"##,
            meta = embed_meta(sku, serial),
            inner_w = WIDTH - 40,
            inner_h = height - 40,
            title = escape_xml(title),
            body = self.body,
        )
    }
}
