use iced::{Background, Border, Color, Shadow, Theme};
use iced::widget::button::{StyleSheet, Appearance};

/// The mouth button turns green while the mouth is believed to be open.
pub struct MouthButtonStyleSheet {
    pub open: bool,
}

impl StyleSheet for MouthButtonStyleSheet {
    type Style = Theme;

    fn active(&self, style: &Self::Style) -> Appearance {
        let palette = style.extended_palette();
        let pair = if self.open { palette.success.base } else { palette.primary.base };

        Appearance {
            shadow_offset: Default::default(),
            background: Some(Background::Color(pair.color)),
            text_color: pair.text,
            border: Border {
                color: Color::TRANSPARENT,
                width: 0.0,
                radius: 2.0.into(),
            },
            shadow: Shadow::default(),
        }
    }
}
