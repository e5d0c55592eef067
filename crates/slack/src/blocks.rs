use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String, emoji: bool },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into(), emoji: true }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "button")]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), text: TextObject::plain(label), value: None }
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "plain_text_input")]
pub struct PlainTextInput {
    pub action_id: String,
    pub multiline: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<TextObject>,
}

impl PlainTextInput {
    pub fn new(action_id: impl Into<String>) -> Self {
        Self { action_id: action_id.into(), multiline: false, placeholder: None }
    }

    pub fn multiline(mut self) -> Self {
        self.multiline = true;
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(TextObject::plain(placeholder));
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        block_id: String,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<ButtonElement>,
    },
    Divider {
        block_id: String,
    },
    Input {
        block_id: String,
        label: TextObject,
        element: PlainTextInput,
        optional: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(rename = "text")]
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

#[derive(Default)]
pub struct BlockBuilder {
    blocks: Vec<Block>,
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        let (text, accessory) = builder.build();
        self.blocks.push(Block::Section { block_id: block_id.into(), text, accessory });
        self
    }

    pub fn divider(mut self, block_id: impl Into<String>) -> Self {
        self.blocks.push(Block::Divider { block_id: block_id.into() });
        self
    }

    pub fn input(
        mut self,
        block_id: impl Into<String>,
        label: impl Into<String>,
        element: PlainTextInput,
    ) -> Self {
        self.blocks.push(Block::Input {
            block_id: block_id.into(),
            label: TextObject::plain(label),
            element,
            optional: false,
        });
        self
    }

    pub fn optional_input(
        mut self,
        block_id: impl Into<String>,
        label: impl Into<String>,
        element: PlainTextInput,
    ) -> Self {
        self.blocks.push(Block::Input {
            block_id: block_id.into(),
            label: TextObject::plain(label),
            element,
            optional: true,
        });
        self
    }

    pub fn build(self) -> Vec<Block> {
        self.blocks
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: BlockBuilder,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: BlockBuilder::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        self.blocks = self.blocks.section(block_id, build);
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks.build() }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    accessory: Option<ButtonElement>,
}

impl SectionBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.accessory = Some(button);
        self
    }

    fn build(self) -> (TextObject, Option<ButtonElement>) {
        (self.text.unwrap_or_else(|| TextObject::plain("")), self.accessory)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Modal,
    Home,
}

/// Surface payload for `views.open` (modal) and `views.publish` (home).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct View {
    #[serde(rename = "type")]
    pub kind: ViewKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<TextObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit: Option<TextObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<TextObject>,
    pub blocks: Vec<Block>,
}

impl View {
    pub fn modal(callback_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind: ViewKind::Modal,
            callback_id: Some(callback_id.into()),
            title: Some(TextObject::plain(title)),
            submit: None,
            close: None,
            blocks: Vec::new(),
        }
    }

    pub fn home() -> Self {
        Self {
            kind: ViewKind::Home,
            callback_id: None,
            title: None,
            submit: None,
            close: None,
            blocks: Vec::new(),
        }
    }

    pub fn submit(mut self, label: impl Into<String>) -> Self {
        self.submit = Some(TextObject::plain(label));
        self
    }

    pub fn close(mut self, label: impl Into<String>) -> Self {
        self.close = Some(TextObject::plain(label));
        self
    }

    pub fn blocks(mut self, blocks: BlockBuilder) -> Self {
        self.blocks = blocks.build();
        self
    }
}

/// Legacy `dialog.open` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Dialog {
    pub callback_id: String,
    pub title: String,
    pub submit_label: String,
    pub notify_on_cancel: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub elements: Vec<DialogElement>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogElement {
    Text {
        label: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
        optional: bool,
    },
    Textarea {
        label: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        hint: Option<String>,
        optional: bool,
    },
    Select {
        label: String,
        name: String,
        options: Vec<DialogOption>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DialogOption {
    pub label: String,
    pub value: String,
}

impl DialogOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), value: value.into() }
    }
}
