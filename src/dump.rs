// Dump orchestrator: walks a game's challenge catalog and mirrors it to
// local disk. The flow is strictly sequential: prepare the output root,
// ask before reusing a non-empty directory, write the game README, then
// one challenge at a time fetch the detail, write its README and stream
// its attachment.
//
// A failure on one challenge is reported and the loop moves on; only
// errors before the per-challenge loop (root preparation, game info)
// abort the run.

use crate::api::{ApiClient, Catalog, ChallengeDetail, ChallengeSummary, GameInfo};
use crate::ui::{Prompter, Reporter};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// How a dump run ended.
#[derive(Debug, PartialEq, Eq)]
pub enum DumpOutcome {
    /// The user declined to reuse a non-empty output directory. Nothing
    /// was written; this is a clean exit, not an error.
    Declined,
    Completed { dumped: usize, failed: usize },
}

pub struct Dumper<'a> {
    api: &'a ApiClient,
    reporter: &'a dyn Reporter,
    root: PathBuf,
    dry_run: bool,
}

impl<'a> Dumper<'a> {
    pub fn new(
        api: &'a ApiClient,
        reporter: &'a dyn Reporter,
        root: impl Into<PathBuf>,
        dry_run: bool,
    ) -> Self {
        Dumper {
            api,
            reporter,
            root: root.into(),
            dry_run,
        }
    }

    /// Run the whole dump for one game. The catalog is fetched by the
    /// caller (it is also used for the challenge listing) and iterated
    /// here in API order.
    pub fn run(
        &self,
        game_id: u64,
        catalog: &Catalog,
        prompter: &mut dyn Prompter,
    ) -> Result<DumpOutcome> {
        self.prepare_root()?;
        if !self.confirm_overwrite(prompter)? {
            return Ok(DumpOutcome::Declined);
        }

        let info = self.api.game_info(game_id)?;
        self.write_game_readme(&info)?;

        let (dumped, failed) = self.dump_challenges(catalog, |challenge| {
            self.api.challenge_detail(game_id, challenge.id)
        });
        Ok(DumpOutcome::Completed { dumped, failed })
    }

    /// Create the output root if absent. A pre-existing directory is fine;
    /// a pre-existing non-directory is not.
    pub fn prepare_root(&self) -> Result<()> {
        if self.root.exists() && !self.root.is_dir() {
            anyhow::bail!("{} exists and is not a directory", self.root.display());
        }
        if self.root.is_dir() {
            return Ok(());
        }
        if self.dry_run {
            self.reporter
                .info(&format!("Would create {}", self.root.display()));
            return Ok(());
        }
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create {}", self.root.display()))
    }

    /// Ask before writing into a non-empty output root. An empty (or not
    /// yet created) root never prompts. Empty answer, `y` and `yes` mean
    /// continue, `n` and `no` mean abort; anything else re-prompts.
    pub fn confirm_overwrite(&self, prompter: &mut dyn Prompter) -> Result<bool> {
        if !self.root.is_dir() || dir_is_empty(&self.root)? {
            return Ok(true);
        }

        self.reporter.info("The output directory is not empty");
        loop {
            let answer = prompter.ask("Do you want to continue? [Y/n]")?;
            match answer.trim().to_lowercase().as_str() {
                "" | "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.reporter.error("Please answer with yes/no"),
            }
        }
    }

    /// Write `<root>/README.md` with the game's metadata.
    pub fn write_game_readme(&self, info: &GameInfo) -> Result<()> {
        let path = self.root.join("README.md");
        if self.dry_run {
            self.reporter.info(&format!("Would write {}", path.display()));
            return Ok(());
        }
        fs::write(&path, render_game_readme(info))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        self.reporter.success(&format!("{} written", path.display()));
        Ok(())
    }

    /// Iterate the catalog, fetching each detail through `fetch` and
    /// writing it out. An error on one challenge is reported with that
    /// item's output path and the loop moves to the next one; the counts
    /// of written and failed challenges come back to the caller.
    fn dump_challenges<F>(&self, catalog: &Catalog, mut fetch: F) -> (usize, usize)
    where
        F: FnMut(&ChallengeSummary) -> Result<ChallengeDetail>,
    {
        let mut dumped = 0;
        let mut failed = 0;
        for (category, challenges) in catalog {
            for challenge in challenges {
                let result =
                    fetch(challenge).and_then(|detail| self.write_challenge(category, &detail));
                match result {
                    Ok(()) => dumped += 1,
                    Err(err) => {
                        failed += 1;
                        let dir = self.challenge_dir(category, &challenge.title);
                        self.reporter.error(&format!("{}: {:#}", dir.display(), err));
                    }
                }
            }
        }
        (dumped, failed)
    }

    /// Write one challenge's directory, README and attachment. Every
    /// write site checks the dry-run flag; the network side (detail
    /// fetch, done by the caller) is not suppressed in dry runs.
    pub fn write_challenge(&self, category: &str, detail: &ChallengeDetail) -> Result<()> {
        let dir = self.challenge_dir(category, &detail.title);

        if self.dry_run {
            self.reporter.info(&format!("Would create {}", dir.display()));
        } else {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let readme = dir.join("README.md");
        if self.dry_run {
            self.reporter
                .info(&format!("Would write {}", readme.display()));
        } else {
            fs::write(&readme, render_challenge_readme(detail))
                .with_context(|| format!("Failed to write {}", readme.display()))?;
            self.reporter
                .success(&format!("{} written", readme.display()));
        }

        if let Some((url, declared_size)) = detail.attachment() {
            let out = dir.join(attachment_basename(url));
            if self.dry_run {
                self.reporter
                    .info(&format!("Would download {}", out.display()));
            } else {
                self.download_attachment(url, declared_size, &out)?;
                self.reporter
                    .success(&format!("{} downloaded", out.display()));
            }
        }
        Ok(())
    }

    /// Stream an attachment to disk, showing byte progress. The body is
    /// copied incrementally, never buffered whole. The declared size is
    /// only used to seed the progress bar when the server sends no
    /// Content-Length; the byte count on disk is not verified against it.
    fn download_attachment(&self, url: &str, declared_size: u64, out: &Path) -> Result<()> {
        let res = self.api.open_attachment(url)?;
        let total = res.content_length().unwrap_or(declared_size);

        let bar = ProgressBar::new(total);
        bar.set_style(ProgressStyle::with_template("{bar:40} {bytes}/{total_bytes} {msg}").unwrap());
        if let Some(name) = out.file_name() {
            bar.set_message(name.to_string_lossy().into_owned());
        }

        let mut reader = bar.wrap_read(res);
        let mut file =
            File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
        io::copy(&mut reader, &mut file)
            .with_context(|| format!("Failed while downloading to {}", out.display()))?;
        bar.finish_and_clear();
        Ok(())
    }

    fn challenge_dir(&self, category: &str, title: &str) -> PathBuf {
        self.root
            .join(sanitize_component(category))
            .join(sanitize_component(title))
    }
}

fn dir_is_empty(path: &Path) -> Result<bool> {
    let mut entries =
        fs::read_dir(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(entries.next().is_none())
}

/// Category and challenge titles come straight from the server, so path
/// separators and leading dots are neutralized before they become
/// directory names. Everything else is kept as-is.
fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            _ => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Final path segment of the attachment URL, used as the local filename.
fn attachment_basename(url: &str) -> String {
    let path = url.split(&['?', '#'][..]).next().unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or(path);
    if name.is_empty() {
        "attachment".to_string()
    } else {
        name.to_string()
    }
}

pub fn render_game_readme(info: &GameInfo) -> String {
    format!(
        "# {}\n\n## Summary\n\n{}\n\n## Description\n\n{}\n",
        info.title, info.summary, info.content
    )
}

pub fn render_challenge_readme(detail: &ChallengeDetail) -> String {
    let mut out = format!(
        "# {}\n\n**Score:** {}\n\n## Description\n\n{}\n\n## Hints\n",
        detail.title, detail.score, detail.content
    );
    for hint in &detail.hints {
        out.push_str("\n- ");
        out.push_str(hint);
    }
    if !detail.hints.is_empty() {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Attachment;
    use crate::ui::tests::{RecordingReporter, ScriptedPrompter};

    fn detail(title: &str, score: u32, hints: &[&str]) -> ChallengeDetail {
        ChallengeDetail {
            title: title.to_string(),
            content: "solve me".to_string(),
            hints: hints.iter().map(|h| h.to_string()).collect(),
            score,
            context: None,
        }
    }

    fn dumper<'a>(
        api: &'a ApiClient,
        reporter: &'a RecordingReporter,
        root: &Path,
        dry_run: bool,
    ) -> Dumper<'a> {
        Dumper::new(api, reporter, root, dry_run)
    }

    fn offline_api() -> ApiClient {
        ApiClient::new("http://localhost").unwrap()
    }

    #[test]
    fn challenge_readme_round_trips_title_and_score() {
        let d = detail("Baby Heap", 487, &["look closer", "tcache"]);
        let rendered = render_challenge_readme(&d);

        let title = rendered
            .lines()
            .find_map(|l| l.strip_prefix("# "))
            .unwrap();
        let score: u32 = rendered
            .lines()
            .find_map(|l| l.strip_prefix("**Score:** "))
            .unwrap()
            .parse()
            .unwrap();

        assert_eq!(title, "Baby Heap");
        assert_eq!(score, 487);
    }

    #[test]
    fn challenge_readme_lists_hints_in_order() {
        let d = detail("x", 100, &["first", "second"]);
        let rendered = render_challenge_readme(&d);

        let bullets: Vec<&str> = rendered
            .lines()
            .filter_map(|l| l.strip_prefix("- "))
            .collect();
        assert_eq!(bullets, vec!["first", "second"]);
    }

    #[test]
    fn empty_hint_list_renders_header_without_items() {
        let rendered = render_challenge_readme(&detail("x", 100, &[]));
        assert!(rendered.ends_with("## Hints\n"));
        assert!(!rendered.contains("- "));
    }

    #[test]
    fn attachment_basename_is_final_path_segment() {
        assert_eq!(
            attachment_basename("/assets/6b8c/challenge.zip"),
            "challenge.zip"
        );
        assert_eq!(
            attachment_basename("https://host/files/a.tar.gz?token=x"),
            "a.tar.gz"
        );
        assert_eq!(attachment_basename("plain.bin"), "plain.bin");
        assert_eq!(attachment_basename("/assets/"), "attachment");
    }

    #[test]
    fn sanitize_keeps_paths_inside_the_root() {
        assert_eq!(sanitize_component("web/easy"), "web_easy");
        assert_eq!(sanitize_component("..\\evil"), "_evil");
        assert_eq!(sanitize_component("../../etc"), "_.._etc");
        assert_eq!(sanitize_component(".."), "_");
        assert_eq!(sanitize_component("misc"), "misc");
    }

    #[test]
    fn prepare_root_rejects_a_file_in_the_way() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("Dump");
        fs::write(&blocked, b"not a dir").unwrap();

        let api = offline_api();
        let reporter = RecordingReporter::new();
        let d = dumper(&api, &reporter, &blocked, false);

        let err = d.prepare_root().unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn prepare_root_in_dry_run_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Dump");

        let api = offline_api();
        let reporter = RecordingReporter::new();
        let d = dumper(&api, &reporter, &root, true);

        d.prepare_root().unwrap();
        assert!(!root.exists());
        let lines = reporter.lines.borrow();
        assert!(lines.iter().any(|l| l.contains("Would create")));
    }

    #[test]
    fn empty_root_never_prompts_for_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let api = offline_api();
        let reporter = RecordingReporter::new();
        let d = dumper(&api, &reporter, dir.path(), false);

        // Any prompt would panic, the script is empty.
        let mut prompter = ScriptedPrompter::new(&[]);
        assert!(d.confirm_overwrite(&mut prompter).unwrap());
    }

    #[test]
    fn non_empty_root_honours_yes_and_no_answers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("leftover"), b"x").unwrap();

        let api = offline_api();
        let reporter = RecordingReporter::new();
        let d = dumper(&api, &reporter, dir.path(), false);

        for answer in ["", "y", "Y", "yes", "YES", " yes "] {
            let mut prompter = ScriptedPrompter::new(&[answer]);
            assert!(d.confirm_overwrite(&mut prompter).unwrap(), "{:?}", answer);
        }
        for answer in ["n", "N", "no", "No"] {
            let mut prompter = ScriptedPrompter::new(&[answer]);
            assert!(!d.confirm_overwrite(&mut prompter).unwrap(), "{:?}", answer);
        }
    }

    #[test]
    fn garbage_answers_re_prompt_until_decisive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("leftover"), b"x").unwrap();

        let api = offline_api();
        let reporter = RecordingReporter::new();
        let d = dumper(&api, &reporter, dir.path(), false);

        let mut prompter = ScriptedPrompter::new(&["maybe", "ok?", "no"]);
        assert!(!d.confirm_overwrite(&mut prompter).unwrap());

        let lines = reporter.lines.borrow();
        let nags = lines.iter().filter(|l| l.contains("yes/no")).count();
        assert_eq!(nags, 2);
    }

    #[test]
    fn write_challenge_creates_dir_readme_and_skips_absent_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let api = offline_api();
        let reporter = RecordingReporter::new();
        let d = dumper(&api, &reporter, dir.path(), false);

        d.write_challenge("pwn", &detail("Baby Heap", 500, &["a"]))
            .unwrap();

        let readme = dir.path().join("pwn").join("Baby Heap").join("README.md");
        let text = fs::read_to_string(&readme).unwrap();
        assert!(text.starts_with("# Baby Heap\n"));
        // No attachment, so the challenge dir holds exactly the README.
        let entries: Vec<_> = fs::read_dir(readme.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn write_challenge_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let api = offline_api();
        let reporter = RecordingReporter::new();
        let d = dumper(&api, &reporter, dir.path(), false);
        let ch = detail("again", 321, &["hint"]);

        d.write_challenge("misc", &ch).unwrap();
        let readme = dir.path().join("misc").join("again").join("README.md");
        let first = fs::read(&readme).unwrap();

        d.write_challenge("misc", &ch).unwrap();
        let second = fs::read(&readme).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn write_challenge_failure_is_scoped_to_that_challenge() {
        let dir = tempfile::tempdir().unwrap();
        // A file squatting on the category name makes every write in that
        // category fail, which is the per-item error `run` catches.
        fs::write(dir.path().join("pwn"), b"squatter").unwrap();

        let api = offline_api();
        let reporter = RecordingReporter::new();
        let d = dumper(&api, &reporter, dir.path(), false);

        assert!(d.write_challenge("pwn", &detail("a", 1, &[])).is_err());
        // A different category is unaffected.
        d.write_challenge("web", &detail("b", 2, &[])).unwrap();
        assert!(dir.path().join("web").join("b").join("README.md").exists());
    }

    #[test]
    fn a_failed_detail_fetch_does_not_stop_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let api = offline_api();
        let reporter = RecordingReporter::new();
        let d = dumper(&api, &reporter, dir.path(), false);

        let mut catalog = Catalog::new();
        catalog.insert(
            "pwn".to_string(),
            vec![
                ChallengeSummary {
                    id: 1,
                    title: "broken".to_string(),
                    score: 100,
                    solved: false,
                },
                ChallengeSummary {
                    id: 2,
                    title: "fine".to_string(),
                    score: 200,
                    solved: false,
                },
            ],
        );

        let (dumped, failed) = d.dump_challenges(&catalog, |challenge| {
            if challenge.id == 1 {
                anyhow::bail!("Fetching challenge detail failed: http 500");
            }
            Ok(detail("fine", 200, &[]))
        });

        assert_eq!(dumped, 1);
        assert_eq!(failed, 1);
        // The second challenge was still written.
        assert!(dir.path().join("pwn").join("fine").join("README.md").exists());
        assert!(!dir.path().join("pwn").join("broken").exists());
        // The failure was reported with the failing item's output path.
        let lines = reporter.lines.borrow();
        assert!(lines
            .iter()
            .any(|l| l.starts_with("error: ") && l.contains("broken") && l.contains("http 500")));
    }

    #[test]
    fn dry_run_reports_every_suppressed_write_and_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let api = offline_api();
        let reporter = RecordingReporter::new();
        let d = dumper(&api, &reporter, dir.path(), true);

        let mut ch = detail("quiet", 50, &[]);
        ch.context = Some(Attachment {
            url: Some("/assets/abc/quiet.zip".to_string()),
            file_size: Some(1234),
        });
        d.write_challenge("web", &ch).unwrap();

        assert!(dir_is_empty(dir.path()).unwrap());
        let lines = reporter.lines.borrow();
        let would: Vec<_> = lines.iter().filter(|l| l.contains("Would ")).collect();
        // Directory, README and attachment: one line each.
        assert_eq!(would.len(), 3);
    }

    #[test]
    fn game_readme_renders_all_three_sections() {
        let info = GameInfo {
            title: "Spring CTF".to_string(),
            summary: "48h online".to_string(),
            content: "rules here".to_string(),
        };
        let rendered = render_game_readme(&info);
        assert!(rendered.starts_with("# Spring CTF\n"));
        assert!(rendered.contains("## Summary\n\n48h online\n"));
        assert!(rendered.contains("## Description\n\nrules here\n"));
    }
}
