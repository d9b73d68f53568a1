use gtk4::CssProvider;

/// Compile-time layout tokens, not user-overridable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleTokens {
    pub spacing_4: i32,
    pub spacing_8: i32,
    pub spacing_12: i32,
    pub spacing_16: i32,
    pub panel_radius: u16,
    pub control_radius: u16,
    pub border_width: u16,
    pub panel_width: i32,
    pub panel_height: i32,
    pub panel_min_width: i32,
    pub panel_min_height: i32,
    pub body_font_pt: u16,
    pub code_font_pt: u16,
}

pub const LAYOUT_TOKENS: StyleTokens = StyleTokens {
    spacing_4: 4,
    spacing_8: 8,
    spacing_12: 12,
    spacing_16: 16,
    panel_radius: 14,
    control_radius: 8,
    border_width: 2,
    panel_width: 800,
    panel_height: 800,
    panel_min_width: 360,
    panel_min_height: 220,
    body_font_pt: 10,
    code_font_pt: 9,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelColors {
    pub frame: &'static str,
    pub background: &'static str,
    pub text: &'static str,
    pub heading: &'static str,
    pub code_text: &'static str,
    pub code_background: &'static str,
    pub button_background: &'static str,
    pub button_hover: &'static str,
    pub button_text: &'static str,
    pub error_text: &'static str,
}

pub const PANEL_COLORS: PanelColors = PanelColors {
    frame: "#2d2d2d",
    background: "#1a1a1a",
    text: "#e0e0e0",
    heading: "#ffffff",
    code_text: "#80c080",
    code_background: "#2a2a2a",
    button_background: "#333333",
    button_hover: "#444444",
    button_text: "#cccccc",
    error_text: "#ff8a80",
};

pub(crate) fn panel_css(tokens: StyleTokens, colors: &PanelColors) -> String {
    format!(
        "
window.clue-panel {{
  background: {frame};
  border-radius: {panel_radius}px;
  padding: {border_width}px;
}}
.clue-panel-content {{
  background: {background};
  border-radius: {panel_radius}px;
}}
.clue-panel textview,
.clue-panel textview text {{
  background: {background};
  color: {text};
  font-size: {body_font_pt}pt;
}}
.clue-panel .clue-panel-title {{
  color: {heading};
  font-weight: bold;
}}
.clue-panel.clue-error .clue-panel-title {{
  color: {error_text};
}}
.clue-panel button {{
  background: {button_background};
  color: {button_text};
  border-radius: {control_radius}px;
  padding: {spacing_4}px {spacing_16}px;
  border: none;
  box-shadow: none;
}}
.clue-panel button:hover {{
  background: {button_hover};
  color: {heading};
}}
.clue-panel scrollbar slider {{
  min-width: {spacing_8}px;
}}
",
        frame = colors.frame,
        background = colors.background,
        text = colors.text,
        heading = colors.heading,
        error_text = colors.error_text,
        button_background = colors.button_background,
        button_hover = colors.button_hover,
        button_text = colors.button_text,
        panel_radius = tokens.panel_radius,
        control_radius = tokens.control_radius,
        border_width = tokens.border_width,
        body_font_pt = tokens.body_font_pt,
        spacing_4 = tokens.spacing_4,
        spacing_8 = tokens.spacing_8,
        spacing_16 = tokens.spacing_16,
    )
}

pub fn install_panel_css(tokens: StyleTokens, colors: &PanelColors) {
    let provider = CssProvider::new();
    provider.load_from_data(&panel_css(tokens, colors));
    if let Some(display) = gtk4::gdk::Display::default() {
        gtk4::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    } else {
        tracing::warn!("no display available; panel css not installed");
    }
}
