//! Start, welcome and fallback pages

use crate::wizard::page::{Input, Page, PageCx, PageId, Widget};
use crate::wizard::structure::InstallType;

#[derive(Debug, Default)]
pub struct NotFoundPage;

impl Page for NotFoundPage {
    fn id(&self) -> PageId {
        PageId::NotFound
    }

    fn can_continue(&self) -> bool {
        false
    }

    fn view(&self) -> Vec<Widget> {
        vec![Widget::Text("404 Not Found".to_string())]
    }
}

const START_OPTIONS: [(&str, InstallType); 4] = [
    ("Install Geode on a GDPS (Private Server)", InstallType::InstallOnGdps),
    ("Install the Geode developer tools", InstallType::InstallDevTools),
    ("Uninstall Geode", InstallType::Uninstall),
    ("Manage installations", InstallType::Manage),
];

/// Action selector for returning users
#[derive(Debug, Default)]
pub struct StartPage {
    selected: usize,
}

impl Page for StartPage {
    fn id(&self) -> PageId {
        PageId::Start
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        cx.request_structure(START_OPTIONS[self.selected].1);
    }

    fn can_go_back(&self) -> bool {
        false
    }

    fn view(&self) -> Vec<Widget> {
        vec![
            Widget::Text("Welcome to the Geode installer!".to_string()),
            Widget::Text("What would you like to do?".to_string()),
            Widget::Choice {
                id: "action",
                options: START_OPTIONS.iter().map(|(label, _)| label.to_string()).collect(),
                selected: self.selected,
            },
        ]
    }

    fn input(&mut self, widget: &str, input: Input, cx: &mut PageCx<'_>) {
        if let ("action", Input::Select(i)) = (widget, input) {
            if i < START_OPTIONS.len() {
                self.selected = i;
                cx.request_structure(START_OPTIONS[i].1);
            }
        }
    }
}

/// Welcome page shown when no install data exists yet
#[derive(Debug, Default)]
pub struct FirstStartPage;

impl Page for FirstStartPage {
    fn id(&self) -> PageId {
        PageId::FirstStart
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        cx.request_structure(InstallType::Install);
    }

    fn can_go_back(&self) -> bool {
        false
    }

    fn view(&self) -> Vec<Widget> {
        vec![
            Widget::Text("Welcome to the Geode installer!".to_string()),
            Widget::Text(
                "This installer will guide you through the setup process of getting the Geode mod loader for Geometry Dash."
                    .to_string(),
            ),
        ]
    }
}
