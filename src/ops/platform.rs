//! Host platform knowledge: game layout, Steam discovery, conflicting
//! loaders, save data and environment edits

use crate::config::Paths;
use crate::error::{InstallerError, Result};
use crate::store::Installation;
use regex_lite::Regex;
use std::path::{Path, PathBuf};

/// Steam app id of Geometry Dash
pub const GD_APP_ID: &str = "322170";

/// Operating system the installer runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Windows,
    MacOs,
    /// Geometry Dash runs through Proton, so the Windows build is used
    Linux,
}

/// How the game is laid out on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameLayout {
    /// `GeometryDash.exe` next to the loader files
    WindowsLike,
    /// `Geometry Dash.app` bundle; loader goes into `Contents/Frameworks`
    MacBundle,
}

/// Platform description used by every operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: HostOs,
    asset_identifier: Option<String>,
}

impl Platform {
    pub fn new(os: HostOs, asset_identifier: Option<String>) -> Self {
        Self {
            os,
            asset_identifier,
        }
    }

    pub fn current() -> Self {
        let os = if cfg!(target_os = "windows") {
            HostOs::Windows
        } else if cfg!(target_os = "macos") {
            HostOs::MacOs
        } else {
            HostOs::Linux
        };
        let identifier = match os {
            HostOs::Windows | HostOs::Linux => Some("win".to_string()),
            HostOs::MacOs => Some("mac".to_string()),
        };
        Self::new(os, identifier)
    }

    /// Replace the release asset identifier
    pub fn with_identifier_override(mut self, identifier: Option<String>) -> Self {
        if let Some(id) = identifier.filter(|i| !i.trim().is_empty()) {
            self.asset_identifier = Some(id.trim().to_string());
        }
        self
    }

    pub fn name(&self) -> &'static str {
        match self.os {
            HostOs::Windows => "Windows",
            HostOs::MacOs => "MacOS",
            HostOs::Linux => "Linux",
        }
    }

    pub fn layout(&self) -> GameLayout {
        match self.os {
            HostOs::MacOs => GameLayout::MacBundle,
            HostOs::Windows | HostOs::Linux => GameLayout::WindowsLike,
        }
    }

    /// Substring identifying this platform's loader and CLI assets
    pub fn asset_identifier(&self) -> Result<&str> {
        self.asset_identifier
            .as_deref()
            .ok_or_else(|| InstallerError::PlatformUnsupported(self.name().to_string()))
    }

    /// Directory an installation is recorded under
    pub fn install_dir_for(&self, game_exe: &Path) -> Result<PathBuf> {
        match self.layout() {
            GameLayout::WindowsLike => game_exe
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .ok_or_else(|| {
                    InstallerError::NotFound(format!(
                        "{} has no parent directory",
                        game_exe.display()
                    ))
                }),
            GameLayout::MacBundle => Ok(game_exe.join("Contents")),
        }
    }

    /// Directory the loader archive is unpacked into
    pub fn loader_dir_for(&self, install_dir: &Path) -> PathBuf {
        match self.layout() {
            GameLayout::WindowsLike => install_dir.to_path_buf(),
            GameLayout::MacBundle => install_dir.join("Frameworks"),
        }
    }

    /// Path to what the user originally selected for `installation`
    pub fn game_executable(&self, installation: &Installation) -> PathBuf {
        match self.layout() {
            GameLayout::WindowsLike => installation.path.join(&installation.executable),
            GameLayout::MacBundle => installation
                .path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| installation.path.clone()),
        }
    }

    /// Check a user-entered game path
    pub fn validate_game_path(&self, path: &Path) -> GamePathCheck {
        if path.as_os_str().is_empty() {
            return GamePathCheck::Empty;
        }
        let exists = match self.layout() {
            GameLayout::WindowsLike => path.is_file(),
            GameLayout::MacBundle => path.is_dir(),
        };
        if !exists {
            return GamePathCheck::Missing;
        }
        let looks_right = match self.layout() {
            GameLayout::WindowsLike => path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("exe")),
            GameLayout::MacBundle => path.extension().is_some_and(|e| e == "app"),
        };
        if looks_right {
            GamePathCheck::Valid
        } else {
            GamePathCheck::Unrecognized
        }
    }

    /// Game location relative to a Steam `common` directory
    fn steam_game_relative(&self) -> &'static str {
        match self.layout() {
            GameLayout::WindowsLike => "Geometry Dash/GeometryDash.exe",
            GameLayout::MacBundle => "Geometry Dash/Geometry Dash.app",
        }
    }

    /// Where Steam keeps itself on this platform
    pub fn steam_roots(&self, paths: &Paths) -> Vec<PathBuf> {
        let home = paths.home_dir();
        match self.os {
            HostOs::Windows => {
                let mut roots = Vec::new();
                if let Some(pf) = std::env::var_os("ProgramFiles(x86)") {
                    roots.push(PathBuf::from(pf).join("Steam"));
                }
                roots.push(PathBuf::from("C:\\Program Files (x86)\\Steam"));
                roots
            }
            HostOs::MacOs => vec![home.join("Library/Application Support/Steam")],
            HostOs::Linux => vec![
                home.join(".steam/steam"),
                home.join(".local/share/Steam"),
                home.join(".var/app/com.valvesoftware.Steam/.local/share/Steam"),
            ],
        }
    }

    /// Probe Steam libraries below `roots` for the game
    pub fn find_game_in_steam(&self, roots: &[PathBuf]) -> Option<PathBuf> {
        let relative = self.steam_game_relative();

        for root in roots {
            if !root.exists() {
                continue;
            }
            let direct = root.join("steamapps/common").join(relative);
            if direct.exists() {
                return Some(direct);
            }
        }

        for root in roots {
            for library in steam_library_folders(root) {
                let candidate = library.join("steamapps/common").join(relative);
                if candidate.exists() {
                    return Some(candidate);
                }
            }
        }

        None
    }

    /// Known-incompatible loaders present in `dir`
    pub fn detect_conflicting_mods(&self, dir: &Path) -> ConflictFlags {
        match self.layout() {
            // no known artifacts to look for inside app bundles
            GameLayout::MacBundle => ConflictFlags::NONE,
            GameLayout::WindowsLike => {
                let mut flags = ConflictFlags::NONE;
                let has = |name: &str| dir.join(name).exists();
                if has("absoluteldr.dll") {
                    flags |= ConflictFlags::MH_V6;
                }
                if has("hackproldr.dll") {
                    flags |= ConflictFlags::MH_V7;
                }
                if has("ToastedMarshmellow.dll") {
                    flags |= ConflictFlags::GDHM;
                }
                // Geode ships its own XInput proxy
                let geode_present = has("geode") || has("Geode.dll");
                let foreign_proxy = has("XInput9_1_0.dll") && !geode_present;
                if foreign_proxy
                    || ["quickldr.dll", "GDDLLLoader.dll", "ModLdr.dll", "minhook.dll"]
                        .iter()
                        .any(|n| has(*n))
                {
                    flags |= ConflictFlags::SOME;
                }
                flags
            }
        }
    }

    /// Files the loader places next to the game, relative to the install dir
    pub fn loader_files(&self) -> &'static [&'static str] {
        match self.layout() {
            GameLayout::WindowsLike => &["geode", "XInput9_1_0.dll", "Geode.dll", "Geode.pdb"],
            GameLayout::MacBundle => &["geode", "Frameworks/Geode.dylib", "Frameworks/fmod.dylib.bak"],
        }
    }

    /// Save data directory belonging to `installation`
    pub fn save_data_dir(&self, paths: &Paths, installation: &Installation) -> PathBuf {
        match self.os {
            HostOs::MacOs => paths
                .home_dir()
                .join("Library/Application Support/GeometryDash/geode"),
            HostOs::Windows => paths
                .local_data_dir()
                .join(installation.executable_stem())
                .join("geode"),
            HostOs::Linux => match proton_prefix_for(&installation.path) {
                Some(prefix) => prefix
                    .join("pfx/drive_c/users/steamuser/AppData/Local")
                    .join(installation.executable_stem())
                    .join("geode"),
                None => paths
                    .local_data_dir()
                    .join(installation.executable_stem())
                    .join("geode"),
            },
        }
    }
}

/// Outcome of checking a game path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePathCheck {
    Empty,
    Missing,
    /// Exists but is not named like the game (GDPS builds often are not)
    Unrecognized,
    Valid,
}

/// Conflicting loader artifacts, as bit flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConflictFlags(u8);

impl ConflictFlags {
    pub const NONE: ConflictFlags = ConflictFlags(0);
    pub const SOME: ConflictFlags = ConflictFlags(1);
    pub const MH_V6: ConflictFlags = ConflictFlags(1 << 1);
    pub const MH_V7: ConflictFlags = ConflictFlags(1 << 2);
    pub const GDHM: ConflictFlags = ConflictFlags(1 << 3);

    pub fn contains(&self, other: ConflictFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ConflictFlags {
    type Output = ConflictFlags;
    fn bitor(self, rhs: Self) -> Self {
        ConflictFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ConflictFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Extra library folders listed in Steam's vdf files
fn steam_library_folders(root: &Path) -> Vec<PathBuf> {
    let mut libraries = Vec::new();

    let sources = [
        (root.join("config/config.vdf"), r#""BaseInstallFolder_\d+"\s+"([^"]+)""#),
        (root.join("steamapps/libraryfolders.vdf"), r#""path"\s+"([^"]+)""#),
    ];

    for (file, pattern) in sources {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        for caps in re.captures_iter(&content) {
            if let Some(m) = caps.get(1) {
                let path = PathBuf::from(m.as_str().replace("\\\\", "\\"));
                if !libraries.contains(&path) {
                    libraries.push(path);
                }
            }
        }
    }

    libraries
}

/// Proton prefix for a game living in a Steam library
fn proton_prefix_for(install_dir: &Path) -> Option<PathBuf> {
    install_dir
        .ancestors()
        .find(|p| p.file_name().is_some_and(|n| n == "steamapps"))
        .map(|steamapps| steamapps.join("compatdata").join(GD_APP_ID))
}

/// True when the installer cannot write into `dir`
pub fn needs_elevation(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    let marker = dir.join(".geode-installer-write-test");
    match std::fs::write(&marker, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&marker);
            false
        }
        Err(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
    }
}

/// User environment edits. Only Windows keeps these persistently; elsewhere
/// the shell profile is the user's business and these are no-ops.
pub mod env {
    use crate::error::Result;
    use std::path::Path;

    #[cfg(windows)]
    fn powershell(script: &str) -> Result<()> {
        use crate::error::InstallerError;

        let output = std::process::Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", script])
            .output()
            .map_err(|e| InstallerError::io("Failed to run powershell", "powershell", e))?;
        if !output.status.success() {
            return Err(InstallerError::PlatformUnsupported(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(())
    }

    #[cfg(windows)]
    fn quote(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    pub fn set_user_var(name: &str, value: &str) -> Result<()> {
        #[cfg(windows)]
        {
            powershell(&format!(
                "[Environment]::SetEnvironmentVariable({}, {}, 'User')",
                quote(name),
                quote(value)
            ))
        }
        #[cfg(not(windows))]
        {
            tracing::debug!("Skipping persistent {}={} on this platform", name, value);
            Ok(())
        }
    }

    pub fn remove_user_var(name: &str) -> Result<()> {
        #[cfg(windows)]
        {
            powershell(&format!(
                "[Environment]::SetEnvironmentVariable({}, $null, 'User')",
                quote(name)
            ))
        }
        #[cfg(not(windows))]
        {
            tracing::debug!("Skipping removal of {} on this platform", name);
            Ok(())
        }
    }

    pub fn add_to_user_path(dir: &Path) -> Result<()> {
        #[cfg(windows)]
        {
            let dir = quote(&dir.to_string_lossy());
            powershell(&format!(
                "$p = [Environment]::GetEnvironmentVariable('Path', 'User'); \
                 if (-not $p) {{ $p = '' }}; \
                 if (-not ($p.Split(';') -contains {dir})) {{ \
                 [Environment]::SetEnvironmentVariable('Path', ($p.TrimEnd(';') + ';' + {dir}).TrimStart(';'), 'User') }}"
            ))
        }
        #[cfg(not(windows))]
        {
            tracing::info!("Add {} to your PATH to use the Geode CLI", dir.display());
            Ok(())
        }
    }

    pub fn remove_from_user_path(dir: &Path) -> Result<()> {
        #[cfg(windows)]
        {
            let dir = quote(&dir.to_string_lossy());
            powershell(&format!(
                "$p = [Environment]::GetEnvironmentVariable('Path', 'User'); \
                 if ($p) {{ [Environment]::SetEnvironmentVariable('Path', \
                 (($p.Split(';') | Where-Object {{ $_ -and $_ -ne {dir} }}) -join ';'), 'User') }}"
            ))
        }
        #[cfg(not(windows))]
        {
            tracing::debug!("Skipping PATH cleanup for {}", dir.display());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Branch;

    fn windows() -> Platform {
        Platform::new(HostOs::Windows, Some("win".into()))
    }

    fn mac() -> Platform {
        Platform::new(HostOs::MacOs, Some("mac".into()))
    }

    #[test]
    fn test_install_dirs() {
        let exe = Path::new("/games/gd/GeometryDash.exe");
        assert_eq!(windows().install_dir_for(exe).unwrap(), PathBuf::from("/games/gd"));
        assert_eq!(
            windows().loader_dir_for(Path::new("/games/gd")),
            PathBuf::from("/games/gd")
        );

        let app = Path::new("/Apps/Geometry Dash.app");
        let dir = mac().install_dir_for(app).unwrap();
        assert_eq!(dir, PathBuf::from("/Apps/Geometry Dash.app/Contents"));
        assert_eq!(
            mac().loader_dir_for(&dir),
            PathBuf::from("/Apps/Geometry Dash.app/Contents/Frameworks")
        );
        assert!(windows().install_dir_for(Path::new("GeometryDash.exe")).is_err());
    }

    #[test]
    fn test_game_executable_round_trip() {
        let inst = Installation::new("/games/gd", "GeometryDash.exe", "v1", Branch::Stable);
        assert_eq!(
            windows().game_executable(&inst),
            PathBuf::from("/games/gd/GeometryDash.exe")
        );
        let inst = Installation::new("/Apps/GD.app/Contents", "GD.app", "v1", Branch::Stable);
        assert_eq!(mac().game_executable(&inst), PathBuf::from("/Apps/GD.app"));
    }

    #[test]
    fn test_missing_identifier_is_unsupported() {
        let platform = Platform::new(HostOs::Linux, None);
        assert!(matches!(
            platform.asset_identifier(),
            Err(InstallerError::PlatformUnsupported(_))
        ));
        let platform = platform.with_identifier_override(Some("win".into()));
        assert_eq!(platform.asset_identifier().unwrap(), "win");
    }

    #[test]
    fn test_validate_game_path() {
        let tmp = tempfile::tempdir().unwrap();
        let exe = tmp.path().join("GeometryDash.exe");
        std::fs::write(&exe, b"").unwrap();
        let other = tmp.path().join("gdps.bin");
        std::fs::write(&other, b"").unwrap();

        let platform = windows();
        assert_eq!(platform.validate_game_path(Path::new("")), GamePathCheck::Empty);
        assert_eq!(
            platform.validate_game_path(&tmp.path().join("nope.exe")),
            GamePathCheck::Missing
        );
        assert_eq!(platform.validate_game_path(tmp.path()), GamePathCheck::Missing);
        assert_eq!(platform.validate_game_path(&exe), GamePathCheck::Valid);
        assert_eq!(platform.validate_game_path(&other), GamePathCheck::Unrecognized);
    }

    #[test]
    fn test_steam_direct_and_library_discovery() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("Steam");
        let library = tmp.path().join("Library2");
        std::fs::create_dir_all(root.join("config")).unwrap();
        std::fs::write(
            root.join("config/config.vdf"),
            format!(
                "\"InstallConfigStore\"\n{{\n\t\"BaseInstallFolder_1\"\t\t\"{}\"\n}}\n",
                library.display()
            ),
        )
        .unwrap();

        let platform = windows();
        assert_eq!(platform.find_game_in_steam(&[root.clone()]), None);

        let exe = library.join("steamapps/common/Geometry Dash/GeometryDash.exe");
        std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
        std::fs::write(&exe, b"").unwrap();
        assert_eq!(platform.find_game_in_steam(&[root.clone()]), Some(exe));

        let direct = root.join("steamapps/common/Geometry Dash/GeometryDash.exe");
        std::fs::create_dir_all(direct.parent().unwrap()).unwrap();
        std::fs::write(&direct, b"").unwrap();
        assert_eq!(platform.find_game_in_steam(&[root]), Some(direct));
    }

    #[test]
    fn test_libraryfolders_vdf() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("steam");
        let library = tmp.path().join("games");
        std::fs::create_dir_all(root.join("steamapps")).unwrap();
        std::fs::write(
            root.join("steamapps/libraryfolders.vdf"),
            format!(
                "\"libraryfolders\"\n{{\n\t\"1\"\n\t{{\n\t\t\"path\"\t\t\"{}\"\n\t}}\n}}\n",
                library.display()
            ),
        )
        .unwrap();
        let exe = library.join("steamapps/common/Geometry Dash/GeometryDash.exe");
        std::fs::create_dir_all(exe.parent().unwrap()).unwrap();
        std::fs::write(&exe, b"").unwrap();

        assert_eq!(windows().find_game_in_steam(&[root]), Some(exe));
    }

    #[test]
    fn test_conflict_detection() {
        let tmp = tempfile::tempdir().unwrap();
        let platform = windows();
        assert!(platform.detect_conflicting_mods(tmp.path()).is_empty());

        std::fs::write(tmp.path().join("hackproldr.dll"), b"").unwrap();
        std::fs::write(tmp.path().join("quickldr.dll"), b"").unwrap();
        let flags = platform.detect_conflicting_mods(tmp.path());
        assert!(flags.contains(ConflictFlags::MH_V7));
        assert!(flags.contains(ConflictFlags::SOME));
        assert!(!flags.contains(ConflictFlags::MH_V6));
        assert!(!flags.contains(ConflictFlags::GDHM));
    }

    #[test]
    fn test_geode_proxy_is_not_a_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        let platform = windows();
        std::fs::write(tmp.path().join("XInput9_1_0.dll"), b"").unwrap();
        assert!(platform
            .detect_conflicting_mods(tmp.path())
            .contains(ConflictFlags::SOME));

        std::fs::create_dir_all(tmp.path().join("geode")).unwrap();
        assert!(platform.detect_conflicting_mods(tmp.path()).is_empty());

        std::fs::remove_dir_all(tmp.path().join("geode")).unwrap();
        std::fs::write(tmp.path().join("Geode.dll"), b"").unwrap();
        assert!(platform.detect_conflicting_mods(tmp.path()).is_empty());
    }

    #[test]
    fn test_mac_has_no_conflict_heuristic() {
        // Known limitation: "no heuristic" reads the same as "no conflicts".
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("absoluteldr.dll"), b"").unwrap();
        assert_eq!(mac().detect_conflicting_mods(tmp.path()), ConflictFlags::NONE);
    }

    #[test]
    fn test_save_data_dirs() {
        let paths = Paths::rooted(Path::new("/r"));
        let inst = Installation::new(
            "/lib/steamapps/common/Geometry Dash",
            "GeometryDash.exe",
            "v1",
            Branch::Stable,
        );
        assert_eq!(
            windows().save_data_dir(&paths, &inst),
            PathBuf::from("/r/local/GeometryDash/geode")
        );
        assert_eq!(
            Platform::new(HostOs::Linux, None).save_data_dir(&paths, &inst),
            PathBuf::from(
                "/lib/steamapps/compatdata/322170/pfx/drive_c/users/steamuser/AppData/Local/GeometryDash/geode"
            )
        );
        assert_eq!(
            mac().save_data_dir(&paths, &inst),
            PathBuf::from("/r/home/Library/Application Support/GeometryDash/geode")
        );
    }

    #[test]
    fn test_needs_elevation_on_writable_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!needs_elevation(tmp.path()));
        assert!(!tmp.path().join(".geode-installer-write-test").exists());
        assert!(!needs_elevation(&tmp.path().join("missing")));
    }
}
