//! Pages of the loader install flow

use super::{save_install_data, OperationView};
use crate::ops::{ConflictFlags, GamePathCheck, Installer, TaskEvent, TaskId, TaskOutput};
use crate::store::Branch;
use crate::wizard::page::{Input, Page, PageCx, PageId, Widget};
use crate::wizard::structure::InstallType;
use std::path::PathBuf;

const DISCORD_URL: &str = "https://discord.gg/9e43WMKzhp";

const EULA_TEXT: &str = "\
GEODE END USER LICENSE AGREEMENT

1. Geode is free software. You may use, copy and share it as long as you do not charge anyone for it.

2. Geode modifies the game files of Geometry Dash. Keep a backup of anything you care about; the Geode team is not responsible for lost save data, broken installations or angry robots.

3. Mods installed through Geode are made by third parties. Only install mods from sources you trust.

4. Geode is not affiliated with RobTop Games. Do not ask RobTop for help with Geode.

5. This software is provided \"as is\", without warranty of any kind.";

#[derive(Debug, Default)]
pub struct EulaPage {
    agreed: bool,
}

impl Page for EulaPage {
    fn id(&self) -> PageId {
        PageId::Eula
    }

    fn can_continue(&self) -> bool {
        self.agreed
    }

    fn view(&self) -> Vec<Widget> {
        vec![
            Widget::Text("Please agree to our finely crafted EULA :)".to_string()),
            Widget::Text(EULA_TEXT.to_string()),
            Widget::Toggle {
                id: "agree",
                label: "I Agree to the Terms & Conditions listed above.".to_string(),
                checked: self.agreed,
            },
        ]
    }

    fn input(&mut self, widget: &str, input: Input, _cx: &mut PageCx<'_>) {
        if widget == "agree" && input == Input::Toggle {
            self.agreed = !self.agreed;
        }
    }
}

#[derive(Debug, Default)]
pub struct InstallGdpsInfoPage;

impl Page for InstallGdpsInfoPage {
    fn id(&self) -> PageId {
        PageId::InstallGdpsInfo
    }

    fn view(&self) -> Vec<Widget> {
        vec![
            Widget::Text("Installing Geode on a GDPS".to_string()),
            Widget::Warning(
                "Geode only supports GDPSes running Geometry Dash 2.113. Installing it on a GDPS based on any other version will not work, and may prevent the GDPS from starting."
                    .to_string(),
            ),
        ]
    }
}

/// Game executable selection
#[derive(Debug)]
pub struct InstallSelectGdPage {
    path: String,
    detected: Option<bool>,
    check: GamePathCheck,
    needs_elevation: bool,
}

impl Default for InstallSelectGdPage {
    fn default() -> Self {
        Self {
            path: String::new(),
            detected: None,
            check: GamePathCheck::Empty,
            needs_elevation: false,
        }
    }
}

impl InstallSelectGdPage {
    fn validate(&mut self, installer: &Installer) {
        let path = PathBuf::from(self.path.trim());
        let platform = installer.platform();
        self.check = platform.validate_game_path(&path);
        self.needs_elevation = match self.check {
            GamePathCheck::Valid | GamePathCheck::Unrecognized => platform
                .install_dir_for(&path)
                .map(|dir| installer.needs_elevation(&dir))
                .unwrap_or(false),
            GamePathCheck::Empty | GamePathCheck::Missing => false,
        };
    }
}

impl Page for InstallSelectGdPage {
    fn id(&self) -> PageId {
        PageId::InstallSelectGd
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        if self.detected.is_none() {
            // GDPS executables never live in Steam libraries
            let found = match cx.context.install_type {
                InstallType::InstallOnGdps => None,
                _ => cx.installer.find_default_game_path(),
            };
            self.detected = Some(found.is_some());
            if let Some(found) = found {
                self.path = found.display().to_string();
            }
        }
        self.validate(cx.installer);
    }

    fn leave(&mut self, cx: &mut PageCx<'_>) {
        let trimmed = self.path.trim();
        cx.context.game_path = (!trimmed.is_empty()).then(|| PathBuf::from(trimmed));
    }

    fn can_continue(&self) -> bool {
        matches!(
            self.check,
            GamePathCheck::Valid | GamePathCheck::Unrecognized
        ) && !self.needs_elevation
    }

    fn view(&self) -> Vec<Widget> {
        let intro = if self.detected == Some(true) {
            "Automatically detected Geometry Dash path! Please verify that it is correct before continuing."
        } else {
            "Unable to automatically detect the Geometry Dash path. Please enter the path to the game executable below."
        };
        let mut widgets = vec![
            Widget::Text(intro.to_string()),
            Widget::TextInput {
                id: "path",
                label: "Geometry Dash path".to_string(),
                value: self.path.clone(),
            },
        ];

        match self.check {
            GamePathCheck::Missing => widgets.push(Widget::Error(
                "Please enter a path to a valid installation of GD 2.113.".to_string(),
            )),
            GamePathCheck::Unrecognized => widgets.push(Widget::Warning(
                "This does not seem like a valid installation of Geometry Dash. Make sure you have selected the right file before continuing."
                    .to_string(),
            )),
            GamePathCheck::Empty | GamePathCheck::Valid => {}
        }
        if self.needs_elevation {
            widgets.push(Widget::Error(
                "The selected directory lacks sufficient permissions to install Geode. Restart the installer as administrator or pick another installation."
                    .to_string(),
            ));
        }
        widgets
    }

    fn input(&mut self, widget: &str, input: Input, cx: &mut PageCx<'_>) {
        if let ("path", Input::Edit(value)) = (widget, input) {
            self.path = value;
            self.validate(cx.installer);
        }
    }
}

fn conflict_message(flags: ConflictFlags) -> &'static str {
    if flags.contains(ConflictFlags::MH_V6) {
        "Looks like you already have MegaHack v6 installed! MegaHack v6 does not work together with Geode. Uninstall it first, or upgrade to MegaHack v7 which Geode can load."
    } else if flags.contains(ConflictFlags::MH_V7) {
        "Looks like you already have MegaHack v7 installed! MegaHack v7 works with Geode, but it will now be loaded by Geode instead of its own loader."
    } else if flags.contains(ConflictFlags::GDHM) {
        "Looks like you already have GD HackerMode installed! GD HackerMode does not work together with Geode; uninstall it before starting the game with Geode."
    } else if flags.contains(ConflictFlags::SOME) {
        "Looks like you already have some mods installed! Other mod loaders may conflict with Geode, so you may have to remove them or install them again as Geode mods."
    } else {
        "You are ready to install Geode!"
    }
}

/// Opt-in to the nightly loader
#[derive(Debug, Default)]
pub struct InstallOptBetaPage {
    beta: bool,
}

impl Page for InstallOptBetaPage {
    fn id(&self) -> PageId {
        PageId::InstallOptBeta
    }

    fn leave(&mut self, cx: &mut PageCx<'_>) {
        cx.context.branch = if self.beta {
            Branch::Nightly
        } else {
            Branch::Stable
        };
    }

    fn view(&self) -> Vec<Widget> {
        vec![
            Widget::Text(
                "Would you like to use the beta version (nightly channel) of the Geode loader? Beta versions may be less stable and have more bugs, but let you try out new features ahead of time."
                    .to_string(),
            ),
            Widget::Toggle {
                id: "beta",
                label: "Use beta version for Loader".to_string(),
                checked: self.beta,
            },
        ]
    }

    fn input(&mut self, widget: &str, input: Input, _cx: &mut PageCx<'_>) {
        if widget == "beta" && input == Input::Toggle {
            self.beta = !self.beta;
        }
    }
}

/// Reports other loaders found next to the game
#[derive(Debug, Default)]
pub struct InstallCheckModsPage {
    flags: ConflictFlags,
}

impl Page for InstallCheckModsPage {
    fn id(&self) -> PageId {
        PageId::InstallCheckMods
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        self.flags = cx
            .context
            .game_path
            .as_deref()
            .and_then(|exe| cx.installer.platform().install_dir_for(exe).ok())
            .map(|dir| cx.installer.detect_conflicting_mods(&dir))
            .unwrap_or(ConflictFlags::NONE);
        if !self.flags.is_empty() {
            tracing::info!(flags = ?self.flags, "Conflicting loaders found");
        }
    }

    fn view(&self) -> Vec<Widget> {
        vec![
            Widget::Text(conflict_message(self.flags).to_string()),
            Widget::Text("Press \"Next\" to begin installing Geode.".to_string()),
        ]
    }
}

/// Downloads and unpacks loader and API, then records the installation
#[derive(Debug, Default)]
pub struct InstallPage {
    op: OperationView,
}

impl InstallPage {
    fn start(&mut self, cx: &mut PageCx<'_>) {
        let Some(game_exe) = cx.context.game_path.clone() else {
            self.op.fail(
                "No game selected",
                "No Geometry Dash path was selected. Go back and pick one.".to_string(),
            );
            return;
        };
        let branch = cx.context.branch;
        let installer = cx.installer.clone();
        let task = cx.spawn(PageId::Install, move |reporter| async move {
            installer
                .install_geode_for(&game_exe, branch, &reporter)
                .await
                .map(TaskOutput::GeodeInstalled)
        });
        self.op.begin(task);
    }
}

impl Page for InstallPage {
    fn id(&self) -> PageId {
        PageId::Install
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        if !self.op.is_running() && !self.op.is_done() {
            self.start(cx);
        }
    }

    fn can_continue(&self) -> bool {
        false
    }

    fn can_go_back(&self) -> bool {
        self.op.has_failed()
    }

    fn view(&self) -> Vec<Widget> {
        let mut widgets = vec![Widget::Text("Installing Geode...".to_string())];
        widgets.extend(self.op.widgets());
        widgets
    }

    fn input(&mut self, widget: &str, input: Input, cx: &mut PageCx<'_>) {
        if widget == "retry" && input == Input::Activate && self.op.has_failed() {
            self.start(cx);
        }
    }

    fn on_task(&mut self, task: TaskId, event: TaskEvent, cx: &mut PageCx<'_>) {
        if !self.op.owns(task) {
            return;
        }
        match event {
            TaskEvent::Progress { state, status } => self.op.progress(state, status),
            TaskEvent::Completed(TaskOutput::GeodeInstalled(installation)) => {
                cx.store.add_or_update(installation.clone());
                cx.context.installed = Some(installation);
                self.op.complete();
                cx.request_next(PageId::Install);
            }
            TaskEvent::Completed(other) => {
                tracing::warn!("Unexpected install result {:?}", other);
            }
            TaskEvent::Failed(reason) => {
                let message = format!(
                    "Error downloading the Geode loader: {}. Try again, and if the problem persists, contact the Geode Development team for more help.",
                    reason
                );
                self.op.fail(&reason, message);
            }
        }
    }
}

#[derive(Debug)]
pub struct InstallFinishedPage {
    launch: bool,
}

impl Default for InstallFinishedPage {
    fn default() -> Self {
        Self { launch: true }
    }
}

impl Page for InstallFinishedPage {
    fn id(&self) -> PageId {
        PageId::InstallFinished
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        save_install_data(cx);
    }

    fn leave(&mut self, cx: &mut PageCx<'_>) {
        if !self.launch {
            return;
        }
        if let Some(installation) = cx.context.installed.clone() {
            if let Err(e) = cx.installer.launch(&installation) {
                cx.error("Unable to launch Geometry Dash", e.to_string());
            }
        }
    }

    fn can_go_back(&self) -> bool {
        false
    }

    fn view(&self) -> Vec<Widget> {
        vec![
            Widget::Text(
                "Installing finished! You can now close this installer & start up Geometry Dash :)"
                    .to_string(),
            ),
            Widget::Toggle {
                id: "launch",
                label: "Launch Geometry Dash".to_string(),
                checked: self.launch,
            },
            Widget::Link {
                id: "discord",
                label: "Join the Geode Discord server".to_string(),
                url: DISCORD_URL.to_string(),
            },
        ]
    }

    fn input(&mut self, widget: &str, input: Input, _cx: &mut PageCx<'_>) {
        if widget == "launch" && input == Input::Toggle {
            self.launch = !self.launch;
        }
    }
}
