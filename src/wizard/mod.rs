//! Wizard engine
//!
//! Drives an ordered sequence of pages. `index == 0` is the start page, which
//! sits outside the sequence; `index` in `1..=len` shows `structure[index - 1]`.
//! Pages are built lazily from a registry and cached for the whole session.

pub mod context;
pub mod page;
pub mod pages;
pub mod structure;
pub mod tasks;

pub use context::{ManageTarget, WizardContext};
pub use page::{Input, Notice, NoticeLevel, Page, PageCx, PageId, Widget};
pub use structure::InstallType;
pub use tasks::Tasks;

use crate::ops::{Installer, TaskMessage};
use crate::store::InstallationStore;
use page::Request;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

/// Builds a fresh page
pub type PageCtor = Box<dyn Fn() -> Box<dyn Page>>;

pub const APP_TITLE: &str = "Geode Installer";

/// State pages may touch, kept apart from the page cache so both can be
/// borrowed at once
struct Shared {
    store: InstallationStore,
    installer: Installer,
    context: WizardContext,
    tasks: Tasks,
    notices: VecDeque<Notice>,
    requests: Vec<Request>,
}

impl Shared {
    fn cx(&mut self) -> PageCx<'_> {
        PageCx {
            store: &mut self.store,
            installer: &self.installer,
            context: &mut self.context,
            tasks: &mut self.tasks,
            notices: &mut self.notices,
            requests: &mut self.requests,
        }
    }
}

pub struct WizardEngine {
    registry: HashMap<PageId, PageCtor>,
    pages: HashMap<PageId, Box<dyn Page>>,
    structure: Vec<PageId>,
    index: usize,
    start: PageId,
    current: Option<PageId>,
    closed: bool,
    shared: Shared,
}

impl WizardEngine {
    /// Engine with every installer page. First-time users start on the
    /// welcome page, everyone else on the action selector.
    pub fn new(store: InstallationStore, installer: Installer, tasks: Tasks) -> Self {
        let start = if store.is_first_time() {
            PageId::FirstStart
        } else {
            PageId::Start
        };
        Self::with_registry(pages::registry(), start, store, installer, tasks)
    }

    pub fn with_registry(
        registry: HashMap<PageId, PageCtor>,
        start: PageId,
        store: InstallationStore,
        installer: Installer,
        tasks: Tasks,
    ) -> Self {
        Self {
            registry,
            pages: HashMap::new(),
            structure: Vec::new(),
            index: 0,
            start,
            current: None,
            closed: false,
            shared: Shared {
                store,
                installer,
                context: WizardContext::default(),
                tasks,
                notices: VecDeque::new(),
                requests: Vec::new(),
            },
        }
    }

    /// Show the start page
    pub fn start(&mut self) {
        self.index = 0;
        let start = self.start;
        self.go_to(start);
        self.drain_requests();
    }

    /// Jump straight into updating the loader at `target`
    pub fn begin_update(&mut self, target: PathBuf) {
        tracing::info!("Update mode for {}", target.display());
        self.shared.context.update_mode = true;
        self.shared.context.manage_target = Some(ManageTarget::Installation(target));
        self.pick_structure(InstallType::Update);
        self.index = 0;
        self.next();
    }

    // ========== Navigation ==========

    fn ensure_page(&mut self, id: PageId) -> bool {
        if self.pages.contains_key(&id) {
            return true;
        }
        match self.registry.get(&id) {
            Some(ctor) => {
                self.pages.insert(id, ctor());
                true
            }
            None => false,
        }
    }

    fn with_page<R>(
        &mut self,
        id: PageId,
        f: impl FnOnce(&mut dyn Page, &mut PageCx<'_>) -> R,
    ) -> Option<R> {
        let page = self.pages.get_mut(&id)?;
        let mut cx = self.shared.cx();
        Some(f(page.as_mut(), &mut cx))
    }

    fn leave_current(&mut self) {
        if let Some(current) = self.current.take() {
            self.with_page(current, |page, cx| page.leave(cx));
        }
    }

    /// Leave the current page and enter `id`, or NotFound when `id` has no
    /// page
    pub fn go_to(&mut self, id: PageId) {
        self.leave_current();

        let target = if self.ensure_page(id) {
            id
        } else if id != PageId::NotFound && self.ensure_page(PageId::NotFound) {
            tracing::warn!("No page registered for {:?}", id);
            PageId::NotFound
        } else {
            tracing::error!("No page registered for {:?} and no fallback", id);
            return;
        };

        self.current = Some(target);
        self.with_page(target, |page, cx| page.enter(cx));
        tracing::debug!(page = ?target, index = self.index, "Entered page");
    }

    fn current_skips(&self) -> bool {
        self.current_page().is_some_and(|p| p.should_skip())
    }

    fn advance(&mut self) {
        if self.structure.is_empty() {
            self.go_to(PageId::NotFound);
            return;
        }
        // index grows every round, so skip chains end at the structure end
        loop {
            self.index += 1;
            if self.index > self.structure.len() {
                self.finish();
                return;
            }
            let id = self.structure[self.index - 1];
            self.go_to(id);
            if !self.current_skips() {
                return;
            }
        }
    }

    fn retreat(&mut self) {
        loop {
            if self.index <= 1 {
                self.index = 0;
                let start = self.start;
                self.go_to(start);
                return;
            }
            self.index -= 1;
            let id = self.structure[self.index - 1];
            self.go_to(id);
            if !self.current_skips() {
                return;
            }
        }
    }

    pub fn next(&mut self) {
        if self.closed {
            return;
        }
        self.advance();
        self.drain_requests();
    }

    pub fn prev(&mut self) {
        if self.closed {
            return;
        }
        self.retreat();
        self.drain_requests();
    }

    /// Next, if the button is enabled
    pub fn press_next(&mut self) -> bool {
        let enabled = self.next_enabled();
        if enabled {
            self.next();
        }
        enabled
    }

    /// Back, if the button is enabled
    pub fn press_back(&mut self) -> bool {
        let enabled = self.back_enabled();
        if enabled {
            self.prev();
        }
        enabled
    }

    /// Replace the page sequence. The caller navigates afterwards.
    pub fn pick_structure(&mut self, install_type: InstallType) {
        self.structure = install_type.structure();
        self.index = self.index.min(self.structure.len());
        self.shared.context.install_type = install_type;
        tracing::debug!(?install_type, pages = self.structure.len(), "Picked structure");
    }

    fn finish(&mut self) {
        self.leave_current();
        self.index = self.structure.len();
        self.closed = true;
        tracing::info!("Wizard finished");
    }

    fn drain_requests(&mut self) {
        while !self.shared.requests.is_empty() {
            let requests = std::mem::take(&mut self.shared.requests);
            for request in requests {
                match request {
                    Request::Next { from } => {
                        if !self.closed && self.current == Some(from) {
                            self.advance();
                        }
                    }
                    Request::Structure(install_type) => self.pick_structure(install_type),
                }
            }
        }
    }

    // ========== Input & events ==========

    /// Forward input to the current page
    pub fn input(&mut self, widget: &str, input: page::Input) {
        if let Some(current) = self.current {
            self.with_page(current, |page, cx| page.input(widget, input, cx));
            self.drain_requests();
        }
    }

    /// Deliver an operation event to the page that started it
    pub fn dispatch(&mut self, msg: TaskMessage) {
        let Some(owner) = self.shared.tasks.route(&msg) else {
            tracing::debug!(task = msg.task.0, "Event for unknown operation");
            return;
        };
        self.with_page(owner, |page, cx| page.on_task(msg.task, msg.event, cx));
        self.drain_requests();
    }

    /// Deliver every queued event without waiting
    pub fn poll_tasks(&mut self) {
        while let Some(msg) = self.shared.tasks.try_recv() {
            self.dispatch(msg);
        }
    }

    /// Deliver events until no operation is running
    pub async fn run_until_idle(&mut self) {
        while self.shared.tasks.has_running() {
            match self.shared.tasks.recv().await {
                Some(msg) => self.dispatch(msg),
                None => break,
            }
        }
    }

    // ========== Closing ==========

    /// Closing before the end, or with operations running, needs the user's
    /// confirmation
    pub fn needs_close_confirmation(&self) -> bool {
        !self.closed
            && (self.index < self.structure.len() || self.shared.tasks.has_running())
    }

    /// Close now if no confirmation is needed
    pub fn request_close(&mut self) -> bool {
        if self.needs_close_confirmation() {
            return false;
        }
        self.closed = true;
        true
    }

    pub fn confirm_close(&mut self) {
        if self.shared.tasks.has_running() {
            tracing::warn!("Closing with operations still running");
        }
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    // ========== State ==========

    pub fn current_id(&self) -> Option<PageId> {
        self.current
    }

    pub fn current_page(&self) -> Option<&dyn Page> {
        self.current
            .and_then(|id| self.pages.get(&id))
            .map(|p| p.as_ref())
    }

    pub fn view(&self) -> Vec<Widget> {
        self.current_page().map(|p| p.view()).unwrap_or_default()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn structure(&self) -> &[PageId] {
        &self.structure
    }

    pub fn back_enabled(&self) -> bool {
        self.index > 0 && self.current_page().is_some_and(|p| p.can_go_back())
    }

    pub fn next_enabled(&self) -> bool {
        self.current_page().is_some_and(|p| p.can_continue())
    }

    pub fn next_label(&self) -> &'static str {
        if self.index == self.structure.len() {
            "Finish"
        } else {
            "Next"
        }
    }

    pub fn title(&self) -> String {
        if self.index == 0 {
            APP_TITLE.to_string()
        } else {
            format!("{} ({}/{})", APP_TITLE, self.index, self.structure.len())
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.shared.notices.front()
    }

    pub fn dismiss_notice(&mut self) {
        self.shared.notices.pop_front();
    }

    /// Queue a notice raised outside of a page
    pub fn push_notice(&mut self, notice: Notice) {
        self.shared.notices.push_back(notice);
    }

    pub fn has_running_tasks(&self) -> bool {
        self.shared.tasks.has_running()
    }

    pub fn store(&self) -> &InstallationStore {
        &self.shared.store
    }

    pub fn context(&self) -> &WizardContext {
        &self.shared.context
    }

    pub fn installer(&self) -> &Installer {
        &self.shared.installer
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Paths;
    use crate::ops::testing::{windows_installer, FakeReleases};
    use crate::store::FileKeyValueStore;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::runtime::Handle;

    pub(crate) fn store_at(root: &Path) -> InstallationStore {
        let paths = Paths::rooted(root);
        InstallationStore::new(
            paths.clone(),
            Box::new(FileKeyValueStore::new(paths.discovery_file())),
        )
    }

    type Log = Arc<Mutex<Vec<String>>>;

    struct TestPage {
        id: PageId,
        skip: bool,
        can_continue: bool,
        can_go_back: bool,
        log: Log,
    }

    impl Page for TestPage {
        fn id(&self) -> PageId {
            self.id
        }
        fn enter(&mut self, _cx: &mut PageCx<'_>) {
            self.log.lock().unwrap().push(format!("enter {:?}", self.id));
        }
        fn leave(&mut self, _cx: &mut PageCx<'_>) {
            self.log.lock().unwrap().push(format!("leave {:?}", self.id));
        }
        fn can_continue(&self) -> bool {
            self.can_continue
        }
        fn can_go_back(&self) -> bool {
            self.can_go_back
        }
        fn should_skip(&self) -> bool {
            self.skip
        }
        fn view(&self) -> Vec<Widget> {
            vec![Widget::Text(format!("{:?}", self.id))]
        }
    }

    struct Spec {
        id: PageId,
        skip: bool,
        can_continue: bool,
        can_go_back: bool,
    }

    fn page(id: PageId) -> Spec {
        Spec {
            id,
            skip: false,
            can_continue: true,
            can_go_back: true,
        }
    }

    fn skipping(id: PageId) -> Spec {
        Spec {
            skip: true,
            ..page(id)
        }
    }

    fn engine(root: &Path, specs: Vec<Spec>, log: &Log) -> WizardEngine {
        let mut registry: HashMap<PageId, PageCtor> = HashMap::new();
        let defaults = [
            PageId::Eula,
            PageId::InstallSelectGd,
            PageId::InstallCheckMods,
            PageId::Install,
            PageId::Start,
            PageId::NotFound,
        ]
        .map(page);
        for spec in specs.into_iter().chain(defaults) {
            let id = spec.id;
            let log = log.clone();
            let ctor: PageCtor = Box::new(move || {
                Box::new(TestPage {
                    id: spec.id,
                    skip: spec.skip,
                    can_continue: spec.can_continue,
                    can_go_back: spec.can_go_back,
                    log: log.clone(),
                })
            });
            registry.entry(id).or_insert(ctor);
        }
        let installer = windows_installer(root, FakeReleases::standard(root));
        let tasks = Tasks::new(Handle::current(), Duration::ZERO);
        let mut engine =
            WizardEngine::with_registry(registry, PageId::Start, store_at(root), installer, tasks);
        engine.structure = vec![
            PageId::Eula,
            PageId::InstallSelectGd,
            PageId::InstallCheckMods,
            PageId::Install,
        ];
        engine
    }

    #[tokio::test]
    async fn test_skip_chain_in_both_directions() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Log::default();
        let mut engine = engine(
            tmp.path(),
            vec![
                page(PageId::Eula),
                skipping(PageId::InstallSelectGd),
                skipping(PageId::InstallCheckMods),
                page(PageId::Install),
            ],
            &log,
        );
        engine.start();

        engine.next();
        assert_eq!(engine.current_id(), Some(PageId::Eula));
        engine.next();
        assert_eq!(engine.current_id(), Some(PageId::Install));
        assert_eq!(engine.index(), 4);

        engine.prev();
        assert_eq!(engine.current_id(), Some(PageId::Eula));
        assert_eq!(engine.index(), 1);

        // skipped pages are still entered and left
        let log = log.lock().unwrap();
        assert!(log.contains(&"enter InstallCheckMods".to_string()));
        assert!(log.contains(&"leave InstallCheckMods".to_string()));
    }

    #[tokio::test]
    async fn test_all_skipping_pages_terminate() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Log::default();
        let mut engine = engine(
            tmp.path(),
            vec![
                skipping(PageId::Eula),
                skipping(PageId::InstallSelectGd),
                skipping(PageId::InstallCheckMods),
                skipping(PageId::Install),
            ],
            &log,
        );
        engine.start();
        engine.next();
        assert!(engine.is_closed());
        assert_eq!(engine.index(), 4);
    }

    #[tokio::test]
    async fn test_all_skipping_pages_terminate_backwards() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Log::default();
        let mut engine = engine(
            tmp.path(),
            vec![
                skipping(PageId::Eula),
                skipping(PageId::InstallSelectGd),
                skipping(PageId::InstallCheckMods),
                page(PageId::Install),
            ],
            &log,
        );
        engine.start();
        engine.next();
        assert_eq!(engine.current_id(), Some(PageId::Install));

        engine.prev();
        assert_eq!(engine.index(), 0);
        assert_eq!(engine.current_id(), Some(PageId::Start));
    }

    #[tokio::test]
    async fn test_bounds() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Log::default();
        let mut engine = engine(tmp.path(), Vec::new(), &log);
        engine.start();

        engine.prev();
        assert_eq!(engine.index(), 0);
        assert_eq!(engine.current_id(), Some(PageId::Start));

        for _ in 0..4 {
            engine.next();
        }
        assert_eq!(engine.current_id(), Some(PageId::Install));
        assert!(!engine.is_closed());

        engine.next();
        assert!(engine.is_closed());
        assert_eq!(engine.index(), 4);
        assert_eq!(log.lock().unwrap().last().unwrap(), "leave Install");

        // closed engines do not navigate
        engine.next();
        assert_eq!(engine.index(), 4);
    }

    #[tokio::test]
    async fn test_button_legality() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Log::default();
        let mut engine = engine(
            tmp.path(),
            vec![
                Spec {
                    can_continue: false,
                    ..page(PageId::Eula)
                },
                Spec {
                    can_go_back: false,
                    ..page(PageId::InstallSelectGd)
                },
            ],
            &log,
        );
        engine.start();
        assert!(!engine.back_enabled());
        assert!(engine.next_enabled());

        engine.next();
        assert_eq!(engine.current_id(), Some(PageId::Eula));
        assert!(engine.back_enabled());
        assert!(!engine.next_enabled());
        assert!(!engine.press_next());
        assert_eq!(engine.current_id(), Some(PageId::Eula));

        engine.next();
        assert_eq!(engine.current_id(), Some(PageId::InstallSelectGd));
        assert!(!engine.back_enabled());
        assert!(!engine.press_back());
        assert!(engine.next_enabled());
    }

    #[tokio::test]
    async fn test_title_and_finish_label() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Log::default();
        let mut engine = engine(tmp.path(), Vec::new(), &log);
        engine.start();
        assert_eq!(engine.title(), "Geode Installer");
        assert_eq!(engine.next_label(), "Next");

        engine.next();
        assert_eq!(engine.title(), "Geode Installer (1/4)");
        for _ in 0..3 {
            engine.next();
        }
        assert_eq!(engine.title(), "Geode Installer (4/4)");
        assert_eq!(engine.next_label(), "Finish");
    }

    #[tokio::test]
    async fn test_missing_page_redirects_to_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Log::default();
        let mut engine = engine(tmp.path(), Vec::new(), &log);
        engine.registry.remove(&PageId::Eula);
        engine.start();
        engine.next();
        assert_eq!(engine.current_id(), Some(PageId::NotFound));
        assert_eq!(engine.index(), 1);

        engine.structure.clear();
        engine.index = 0;
        engine.next();
        assert_eq!(engine.current_id(), Some(PageId::NotFound));
    }

    #[tokio::test]
    async fn test_close_confirmation() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Log::default();
        let mut engine = engine(tmp.path(), Vec::new(), &log);
        engine.start();
        assert!(engine.needs_close_confirmation());
        assert!(!engine.request_close());
        assert!(!engine.is_closed());
        engine.confirm_close();
        assert!(engine.is_closed());
    }

    #[tokio::test]
    async fn test_close_at_last_page_without_confirmation() {
        let tmp = tempfile::tempdir().unwrap();
        let log = Log::default();
        let mut engine = engine(tmp.path(), Vec::new(), &log);
        engine.start();
        for _ in 0..4 {
            engine.next();
        }
        assert!(!engine.needs_close_confirmation());
        assert!(engine.request_close());
    }
}
