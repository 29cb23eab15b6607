//! Overlay element data model.
//!
//! Every element shares an identity, a page and a screen-space box. What it
//! draws is carried by [`ElementKind`], a closed set of variants.

use crate::geometry::{ScreenRect, ScreenSize};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable element identity. Generated as UUID v4 and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub uuid::Uuid);

impl ElementId {
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDecoration {
    #[default]
    None,
    Underline,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextProps {
    pub content: String,
    pub font_size: f64,
    /// `#rrggbb`
    pub color: String,
    #[serde(default)]
    pub font_weight: FontWeight,
    #[serde(default)]
    pub font_style: FontStyle,
    #[serde(default)]
    pub text_decoration: TextDecoration,
    #[serde(default)]
    pub text_align: TextAlign,
}

impl Default for TextProps {
    fn default() -> Self {
        Self {
            content: String::new(),
            font_size: 16.0,
            color: "#000000".to_owned(),
            font_weight: FontWeight::Normal,
            font_style: FontStyle::Normal,
            text_decoration: TextDecoration::None,
            text_align: TextAlign::Left,
        }
    }
}

/// Bitmap payload shared by images and signatures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageProps {
    /// `data:image/<png|jpeg>;base64,...`, possibly empty.
    #[serde(default)]
    pub image_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateField {
    #[serde(default)]
    pub value: String,
    pub format: String,
    #[serde(default)]
    pub required: bool,
}

impl Default for DateField {
    fn default() -> Self {
        Self {
            value: String::new(),
            format: "YYYY-MM-DD".to_owned(),
            required: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckboxField {
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialsField {
    #[serde(default)]
    pub image_data: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFieldProps {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub placeholder: String,
    pub font_size: f64,
    #[serde(default)]
    pub required: bool,
}

impl Default for TextFieldProps {
    fn default() -> Self {
        Self {
            value: String::new(),
            placeholder: String::new(),
            font_size: 14.0,
            required: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingBlock {
    pub order: u32,
    #[serde(default)]
    pub text: String,
    pub level: u8,
}

impl HeadingBlock {
    /// Font size in screen pixels for the heading level.
    pub fn font_size(&self) -> f64 {
        match self.level.clamp(1, 6) {
            1 => 32.0,
            2 => 24.0,
            3 => 20.0,
            4 => 16.0,
            5 => 14.0,
            _ => 12.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBlock {
    pub order: u32,
    #[serde(default)]
    pub image_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoBlock {
    pub order: u32,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableBlock {
    pub order: u32,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

/// Kind-specific payload of an overlay element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ElementKind {
    Text(TextProps),
    Image(ImageProps),
    Signature(ImageProps),
    Date(DateField),
    Checkbox(CheckboxField),
    Initials(InitialsField),
    TextField(TextFieldProps),
    Heading(HeadingBlock),
    ImageBlock(ImageBlock),
    Video(VideoBlock),
    Table(TableBlock),
}

impl ElementKind {
    pub fn element_type(&self) -> ElementType {
        match self {
            Self::Text(_) => ElementType::Text,
            Self::Image(_) => ElementType::Image,
            Self::Signature(_) => ElementType::Signature,
            Self::Date(_) => ElementType::Date,
            Self::Checkbox(_) => ElementType::Checkbox,
            Self::Initials(_) => ElementType::Initials,
            Self::TextField(_) => ElementType::TextField,
            Self::Heading(_) => ElementType::Heading,
            Self::ImageBlock(_) => ElementType::ImageBlock,
            Self::Video(_) => ElementType::Video,
            Self::Table(_) => ElementType::Table,
        }
    }

    /// Page-local flow order, for block variants only.
    pub fn block_order(&self) -> Option<u32> {
        match self {
            Self::Heading(block) => Some(block.order),
            Self::ImageBlock(block) => Some(block.order),
            Self::Video(block) => Some(block.order),
            Self::Table(block) => Some(block.order),
            _ => None,
        }
    }

    pub(crate) fn set_block_order(&mut self, order: u32) {
        match self {
            Self::Heading(block) => block.order = order,
            Self::ImageBlock(block) => block.order = order,
            Self::Video(block) => block.order = order,
            Self::Table(block) => block.order = order,
            _ => {}
        }
    }

    /// Whether the element is a fillable form field.
    pub fn required(&self) -> Option<bool> {
        match self {
            Self::Date(field) => Some(field.required),
            Self::Checkbox(field) => Some(field.required),
            Self::Initials(field) => Some(field.required),
            Self::TextField(field) => Some(field.required),
            _ => None,
        }
    }
}

/// Fieldless discriminant of [`ElementKind`], used to create elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementType {
    Text,
    Image,
    Signature,
    Date,
    Checkbox,
    Initials,
    TextField,
    Heading,
    ImageBlock,
    Video,
    Table,
}

impl ElementType {
    pub const ALL: [ElementType; 11] = [
        Self::Text,
        Self::Image,
        Self::Signature,
        Self::Date,
        Self::Checkbox,
        Self::Initials,
        Self::TextField,
        Self::Heading,
        Self::ImageBlock,
        Self::Video,
        Self::Table,
    ];

    /// Size given to a freshly placed element, in screen pixels.
    pub fn default_size(self) -> ScreenSize {
        let (width, height) = match self {
            Self::Text => (200.0, 40.0),
            Self::Image => (200.0, 150.0),
            Self::Signature => (150.0, 80.0),
            Self::Date => (150.0, 40.0),
            Self::Checkbox => (40.0, 40.0),
            Self::Initials => (100.0, 60.0),
            Self::TextField => (200.0, 40.0),
            Self::Heading => (400.0, 50.0),
            Self::ImageBlock => (300.0, 200.0),
            Self::Video => (320.0, 180.0),
            Self::Table => (400.0, 200.0),
        };
        ScreenSize::new(width, height)
    }

    pub fn is_block(self) -> bool {
        matches!(self, Self::Heading | Self::ImageBlock | Self::Video | Self::Table)
    }

    /// Default payload. `order` only matters for block variants.
    pub fn default_kind(self, order: u32) -> ElementKind {
        match self {
            Self::Text => ElementKind::Text(TextProps::default()),
            Self::Image => ElementKind::Image(ImageProps::default()),
            Self::Signature => ElementKind::Signature(ImageProps::default()),
            Self::Date => ElementKind::Date(DateField::default()),
            Self::Checkbox => ElementKind::Checkbox(CheckboxField::default()),
            Self::Initials => ElementKind::Initials(InitialsField::default()),
            Self::TextField => ElementKind::TextField(TextFieldProps::default()),
            Self::Heading => {
                ElementKind::Heading(HeadingBlock {
                    order,
                    text: String::new(),
                    level: 1,
                })
            }
            Self::ImageBlock => {
                ElementKind::ImageBlock(ImageBlock {
                    order,
                    image_data: String::new(),
                })
            }
            Self::Video => ElementKind::Video(VideoBlock {
                order,
                url: String::new(),
            }),
            Self::Table => ElementKind::Table(TableBlock {
                order,
                rows: vec![vec![String::new(); 2]; 2],
            }),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Signature => "signature",
            Self::Date => "date",
            Self::Checkbox => "checkbox",
            Self::Initials => "initials",
            Self::TextField => "text-field",
            Self::Heading => "heading",
            Self::ImageBlock => "image-block",
            Self::Video => "video",
            Self::Table => "table",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ElementType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.to_string() == value)
            .ok_or_else(|| format!("unknown element type `{value}`"))
    }
}

/// A user-placed overlay anchored to one page, in screen pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayElement {
    pub id: ElementId,
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl OverlayElement {
    pub fn rect(&self) -> ScreenRect {
        ScreenRect::new(self.x, self.y, self.width, self.height)
    }

    pub fn element_type(&self) -> ElementType {
        self.kind.element_type()
    }

    pub fn is_block(&self) -> bool {
        self.element_type().is_block()
    }
}

/// Partial text style update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextPatch {
    pub content: Option<String>,
    pub font_size: Option<f64>,
    pub color: Option<String>,
    pub font_weight: Option<FontWeight>,
    pub font_style: Option<FontStyle>,
    pub text_decoration: Option<TextDecoration>,
    pub text_align: Option<TextAlign>,
}

impl TextPatch {
    pub(crate) fn apply(self, props: &mut TextProps) {
        if let Some(content) = self.content {
            props.content = content;
        }
        if let Some(font_size) = self.font_size {
            props.font_size = font_size;
        }
        if let Some(color) = self.color {
            props.color = color;
        }
        if let Some(weight) = self.font_weight {
            props.font_weight = weight;
        }
        if let Some(style) = self.font_style {
            props.font_style = style;
        }
        if let Some(decoration) = self.text_decoration {
            props.text_decoration = decoration;
        }
        if let Some(align) = self.text_align {
            props.text_align = align;
        }
    }
}

/// Partial element update. Identity and page are never part of a patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub text: Option<TextPatch>,
    /// Replaces the bitmap of image-like kinds (image, signature, initials, image-block).
    pub image_data: Option<String>,
    /// Replaces the whole payload; must keep the same [`ElementType`].
    pub kind: Option<ElementKind>,
}

impl ElementPatch {
    pub fn moved_to(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    pub fn resized(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn text(patch: TextPatch) -> Self {
        Self {
            text: Some(patch),
            ..Self::default()
        }
    }
}

/// Parses `#rrggbb` (leading `#` optional) into normalized RGB, black on failure.
pub fn parse_hex_color(color: &str) -> (f32, f32, f32) {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return (0.0, 0.0, 0.0);
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map(|value| value as f32 / 255.0)
    };

    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Ok(r), Ok(g), Ok(b)) => (r, g, b),
        _ => (0.0, 0.0, 0.0),
    }
}
