//! Frame rendering: HTML meta tags, JSON view, and SVG card images.

use castgate_core::VerificationOutcome;
use serde::Serialize;

use crate::frame::event::{ENTER, RESET};
use crate::frame::FrameState;

/// Card size for a 1.91:1 frame image.
const IMAGE_WIDTH: u32 = 1146;
const IMAGE_HEIGHT: u32 = 600;
const WRAP_COLUMNS: usize = 26;

/// Everything a frame can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Prompt,
    Accepted,
    AuthMissing,
    ReactionMissing,
    NotFollowing,
    TransientError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameButton {
    pub label: &'static str,
    pub value: &'static str,
}

const ENTER_BUTTON: FrameButton = FrameButton {
    label: "Enter",
    value: ENTER,
};

const RETRY_BUTTON: FrameButton = FrameButton {
    label: "Try Again",
    value: RESET,
};

impl Screen {
    pub const ALL: [Screen; 6] = [
        Screen::Prompt,
        Screen::Accepted,
        Screen::AuthMissing,
        Screen::ReactionMissing,
        Screen::NotFollowing,
        Screen::TransientError,
    ];

    pub fn for_state(state: &FrameState) -> Self {
        match state.outcome() {
            None => Screen::Prompt,
            Some(VerificationOutcome::Accepted) => Screen::Accepted,
            Some(VerificationOutcome::AuthMissing) => Screen::AuthMissing,
            Some(VerificationOutcome::ReactionMissing) => Screen::ReactionMissing,
            Some(VerificationOutcome::NotFollowing) => Screen::NotFollowing,
            Some(VerificationOutcome::TransientError) => Screen::TransientError,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Screen::Prompt => "prompt",
            Screen::Accepted => "accepted",
            Screen::AuthMissing => "auth_missing",
            Screen::ReactionMissing => "reaction_missing",
            Screen::NotFollowing => "not_following",
            Screen::TransientError => "transient_error",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|screen| screen.slug() == slug)
    }

    pub fn message(self) -> &'static str {
        match self {
            Screen::Prompt => "Press Enter to Proceed",
            Screen::Accepted => "Welcome to the Pod!",
            Screen::AuthMissing => "We couldn't tell who you are. Sign in and try again.",
            Screen::ReactionMissing => "Like and recast the cast first, then try again.",
            Screen::NotFollowing => "Follow the account first, then try again.",
            Screen::TransientError => "Something went wrong while verifying. Try again later.",
        }
    }

    pub fn buttons(self) -> Vec<FrameButton> {
        match self {
            Screen::Prompt => vec![ENTER_BUTTON],
            Screen::Accepted => vec![],
            Screen::AuthMissing
            | Screen::ReactionMissing
            | Screen::NotFollowing
            | Screen::TransientError => vec![RETRY_BUTTON],
        }
    }

    fn background(self) -> Background {
        match self {
            Screen::Prompt => Background::Solid("black"),
            Screen::Accepted => Background::Gradient("#432889", "#17101F"),
            _ => Background::Gradient("#5c1a1a", "#1f1010"),
        }
    }
}

enum Background {
    Solid(&'static str),
    Gradient(&'static str, &'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonView {
    pub index: usize,
    pub label: String,
    pub value: String,
    /// Post URL carrying the button value, so index-only clients still resolve it.
    pub target: String,
}

/// Presentational payload handed to the HTML and JSON encoders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameView {
    pub title: String,
    pub screen: &'static str,
    pub message: &'static str,
    pub image_url: String,
    pub post_url: String,
    pub buttons: Vec<ButtonView>,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    public_url: String,
    base_path: String,
    title: String,
}

impl Renderer {
    /// `base_path` must already be normalized (see `config::normalize_base_path`).
    pub fn new(public_url: &str, base_path: &str, title: &str) -> Self {
        Self {
            public_url: public_url.trim_end_matches('/').to_string(),
            base_path: base_path.to_string(),
            title: title.to_string(),
        }
    }

    /// Route of the frame endpoint.
    pub fn frame_route(&self) -> String {
        if self.base_path.is_empty() {
            "/".to_string()
        } else {
            self.base_path.clone()
        }
    }

    /// Route template of the image endpoint.
    pub fn image_route(&self) -> String {
        format!("{}/image/:screen", self.base_path)
    }

    fn post_url(&self) -> String {
        format!("{}{}", self.public_url, self.frame_route())
    }

    pub fn view(&self, screen: Screen) -> FrameView {
        let post_url = self.post_url();
        let buttons = screen
            .buttons()
            .into_iter()
            .enumerate()
            .map(|(i, button)| ButtonView {
                index: i + 1,
                label: button.label.to_string(),
                value: button.value.to_string(),
                target: format!("{}?button={}", post_url, button.value),
            })
            .collect();

        FrameView {
            title: self.title.clone(),
            screen: screen.slug(),
            message: screen.message(),
            image_url: format!(
                "{}{}/image/{}",
                self.public_url,
                self.base_path,
                screen.slug()
            ),
            post_url,
            buttons,
        }
    }

    pub fn html(&self, view: &FrameView) -> String {
        let mut meta = vec![
            meta_tag("og:title", &view.title),
            meta_tag("og:image", &view.image_url),
            meta_tag("fc:frame", "vNext"),
            meta_tag("fc:frame:image", &view.image_url),
            meta_tag("fc:frame:image:aspect_ratio", "1.91:1"),
            meta_tag("fc:frame:post_url", &view.post_url),
        ];
        for button in &view.buttons {
            let prefix = format!("fc:frame:button:{}", button.index);
            meta.push(meta_tag(&prefix, &button.label));
            meta.push(meta_tag(&format!("{}:action", prefix), "post"));
            meta.push(meta_tag(&format!("{}:target", prefix), &button.target));
        }

        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n{meta}\n</head>\n<body>\n<img src=\"{image}\" alt=\"{alt}\">\n</body>\n</html>\n",
            title = escape_html(&view.title),
            meta = meta.join("\n"),
            image = escape_html(&view.image_url),
            alt = escape_html(view.message),
        )
    }
}

fn meta_tag(property: &str, content: &str) -> String {
    format!(
        "<meta property=\"{}\" content=\"{}\">",
        escape_html(property),
        escape_html(content)
    )
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Greedy word wrap; words longer than `columns` get a line of their own.
fn wrap_words(text: &str, columns: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > columns {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// SVG card showing the screen's message in white on its background.
pub fn svg(screen: Screen) -> String {
    let (defs, fill) = match screen.background() {
        Background::Solid(color) => (String::new(), color.to_string()),
        Background::Gradient(from, to) => (
            format!(
                "<defs><linearGradient id=\"bg\" x1=\"0\" y1=\"0\" x2=\"1\" y2=\"0\"><stop offset=\"0\" stop-color=\"{}\"/><stop offset=\"1\" stop-color=\"{}\"/></linearGradient></defs>",
                from, to
            ),
            "url(#bg)".to_string(),
        ),
    };

    let lines = wrap_words(screen.message(), WRAP_COLUMNS);
    let line_height = 72;
    let first_y = IMAGE_HEIGHT as i64 / 2 + 30 - (lines.len() as i64 - 1) * line_height / 2;
    let tspans: String = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            format!(
                "<tspan x=\"50%\" y=\"{}\">{}</tspan>",
                first_y + i as i64 * line_height,
                escape_html(line)
            )
        })
        .collect();

    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">{defs}<rect width=\"100%\" height=\"100%\" fill=\"{fill}\"/><text fill=\"white\" font-family=\"sans-serif\" font-size=\"60\" text-anchor=\"middle\">{tspans}</text></svg>",
        w = IMAGE_WIDTH,
        h = IMAGE_HEIGHT,
        defs = defs,
        fill = fill,
        tspans = tspans,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn renderer() -> Renderer {
        Renderer::new("https://frames.example.com/", "/api", "Gate & Co")
    }

    #[test]
    fn test_each_outcome_has_a_distinct_screen() {
        let outcomes = [
            VerificationOutcome::Accepted,
            VerificationOutcome::AuthMissing,
            VerificationOutcome::ReactionMissing,
            VerificationOutcome::NotFollowing,
            VerificationOutcome::TransientError,
        ];
        let mut screens: HashSet<Screen> = outcomes
            .iter()
            .map(|&outcome| Screen::for_state(&FrameState::Result { outcome }))
            .collect();
        screens.insert(Screen::for_state(&FrameState::Prompt));
        assert_eq!(screens.len(), Screen::ALL.len());
    }

    #[test]
    fn test_slug_round_trip_and_unknown_slug() {
        for screen in Screen::ALL {
            assert_eq!(Screen::from_slug(screen.slug()), Some(screen));
        }
        assert_eq!(Screen::from_slug("invalid_state"), None);
    }

    #[test]
    fn test_failures_offer_reset_and_success_offers_nothing() {
        assert_eq!(Screen::Prompt.buttons(), vec![ENTER_BUTTON]);
        assert!(Screen::Accepted.buttons().is_empty());
        for screen in [
            Screen::AuthMissing,
            Screen::ReactionMissing,
            Screen::NotFollowing,
            Screen::TransientError,
        ] {
            assert_eq!(screen.buttons(), vec![RETRY_BUTTON]);
        }
    }

    #[test]
    fn test_view_urls() {
        let view = renderer().view(Screen::Prompt);
        assert_eq!(view.post_url, "https://frames.example.com/api");
        assert_eq!(view.image_url, "https://frames.example.com/api/image/prompt");
        assert_eq!(
            view.buttons[0].target,
            "https://frames.example.com/api?button=enter"
        );
        assert_eq!(view.buttons[0].index, 1);
    }

    #[test]
    fn test_root_base_path_routes() {
        let renderer = Renderer::new("http://localhost:3000", "", "t");
        assert_eq!(renderer.frame_route(), "/");
        assert_eq!(renderer.image_route(), "/image/:screen");
        assert_eq!(
            renderer.view(Screen::Accepted).image_url,
            "http://localhost:3000/image/accepted"
        );
    }

    #[test]
    fn test_html_contains_frame_meta_tags_and_escapes() {
        let renderer = renderer();
        let html = renderer.html(&renderer.view(Screen::ReactionMissing));
        assert!(html.contains("<meta property=\"fc:frame\" content=\"vNext\">"));
        assert!(html.contains(
            "<meta property=\"fc:frame:image\" content=\"https://frames.example.com/api/image/reaction_missing\">"
        ));
        assert!(html.contains("<meta property=\"fc:frame:button:1\" content=\"Try Again\">"));
        assert!(html.contains("<title>Gate &amp; Co</title>"));
        assert!(!html.contains("fc:frame:button:2"));
    }

    #[test]
    fn test_wrap_words() {
        assert_eq!(
            wrap_words("Press Enter to Proceed", 12),
            vec!["Press Enter", "to Proceed"]
        );
        assert_eq!(wrap_words("", 12), Vec::<String>::new());
        assert_eq!(wrap_words("supercalifragilistic ok", 5), vec!["supercalifragilistic", "ok"]);
    }

    #[test]
    fn test_svg_renders_message_and_background() {
        let prompt = svg(Screen::Prompt);
        assert!(prompt.starts_with("<svg"));
        assert!(prompt.contains("fill=\"black\""));
        assert!(prompt.contains("Press Enter to Proceed"));

        let accepted = svg(Screen::Accepted);
        assert!(accepted.contains("#432889"));
        assert!(accepted.contains("Welcome to the Pod!"));

        let auth = svg(Screen::AuthMissing);
        assert!(auth.contains("couldn&#39;t"));
    }
}
