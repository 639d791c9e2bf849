use crate::archive::ArchiveSink;
use crate::debug::DebugLogger;
use crate::error::RollPressError;
use crate::metrics::{GroupMetrics, RunMetrics};
use crate::roster::Group;

/// What happens when one center's document fails to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupFailurePolicy {
    /// The whole run fails and no archive is produced.
    #[default]
    Abort,
    /// The failing center is left out; the rest render and the report names
    /// what was dropped.
    SkipAndReport,
}

#[derive(Debug, Clone)]
pub struct SkippedGroup {
    pub key: String,
    pub message: String,
}

/// Outcome of one archive run: which centers rendered, which were skipped
/// under [`GroupFailurePolicy::SkipAndReport`], and the run's metrics.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub rendered: Vec<String>,
    pub skipped: Vec<SkippedGroup>,
    pub metrics: RunMetrics,
}

impl RunReport {
    /// One human-readable line for the caller's status surface.
    pub fn status_line(&self) -> String {
        if self.skipped.is_empty() {
            format!("rendered {} centers", self.rendered.len())
        } else {
            let keys: Vec<&str> = self.skipped.iter().map(|s| s.key.as_str()).collect();
            format!(
                "rendered {} centers, skipped {}: {}",
                self.rendered.len(),
                self.skipped.len(),
                keys.join(", ")
            )
        }
    }
}

/// Runs the batch: renders each group in its stable order through `render`,
/// files the bytes into the sink as `<key>.<extension>`, and finalizes the
/// sink only once every group has been handled. Group keys are unique by
/// construction, so entry names never collide.
pub(crate) fn run_batch<S, F>(
    groups: &[Group],
    extension: &str,
    policy: GroupFailurePolicy,
    mut sink: S,
    debug: Option<&DebugLogger>,
    mut render: F,
) -> Result<(Vec<u8>, RunReport), RollPressError>
where
    S: ArchiveSink,
    F: FnMut(&Group) -> Result<(Vec<u8>, GroupMetrics), RollPressError>,
{
    let mut report = RunReport::default();
    for group in groups {
        if let Some(logger) = debug {
            logger.group_start(&group.key, group.records.len());
        }
        match render(group) {
            Ok((bytes, metrics)) => {
                if let Some(logger) = debug {
                    logger.group_finish(&group.key, metrics.page_count(), bytes.len());
                }
                report.metrics.total_render_ms += metrics.render_ms;
                report.metrics.groups.push(metrics);
                sink.put(&format!("{}.{}", group.key, extension), bytes);
                report.rendered.push(group.key.clone());
            }
            Err(err) => {
                // Asset failures are never per-group: the same fonts and
                // banners serve every center, so no policy lets the run
                // continue past one.
                if matches!(err, RollPressError::Asset(_)) {
                    return Err(err);
                }
                let message = err.to_string();
                match policy {
                    GroupFailurePolicy::Abort => {
                        return Err(RollPressError::Render {
                            key: group.key.clone(),
                            message,
                        });
                    }
                    GroupFailurePolicy::SkipAndReport => {
                        if let Some(logger) = debug {
                            logger.group_skipped(&group.key, &message);
                        }
                        report.skipped.push(SkippedGroup {
                            key: group.key.clone(),
                            message,
                        });
                    }
                }
            }
        }
    }
    let archive = sink.finalize()?;
    report.metrics.archive_bytes = archive.len();
    if let Some(logger) = debug {
        logger.archive_finalize(report.rendered.len(), archive.len());
    }
    Ok((archive, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::GroupMeta;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records puts and the finalize call so ordering is observable.
    struct TraceSink {
        entries: Rc<RefCell<Vec<String>>>,
        finalized: Rc<RefCell<bool>>,
    }

    impl ArchiveSink for TraceSink {
        fn put(&mut self, name: &str, bytes: Vec<u8>) {
            assert!(!*self.finalized.borrow(), "put after finalize");
            self.entries.borrow_mut().push(format!("{name}:{}", bytes.len()));
        }

        fn finalize(self) -> Result<Vec<u8>, RollPressError> {
            *self.finalized.borrow_mut() = true;
            Ok(self.entries.borrow().join("|").into_bytes())
        }
    }

    fn groups(keys: &[&str]) -> Vec<Group> {
        keys.iter()
            .map(|key| Group {
                key: key.to_string(),
                meta: GroupMeta::default(),
                records: Vec::new(),
            })
            .collect()
    }

    fn ok_render(group: &Group) -> Result<(Vec<u8>, GroupMetrics), RollPressError> {
        Ok((
            group.key.clone().into_bytes(),
            GroupMetrics {
                key: group.key.clone(),
                ..GroupMetrics::default()
            },
        ))
    }

    #[test]
    fn entries_land_in_stable_group_order_before_finalize() {
        let entries = Rc::new(RefCell::new(Vec::new()));
        let finalized = Rc::new(RefCell::new(false));
        let sink = TraceSink {
            entries: entries.clone(),
            finalized: finalized.clone(),
        };
        let (archive, report) = run_batch(
            &groups(&["5", "3", "7"]),
            "pdf",
            GroupFailurePolicy::Abort,
            sink,
            None,
            ok_render,
        )
        .unwrap();
        assert_eq!(*entries.borrow(), ["5.pdf:1", "3.pdf:1", "7.pdf:1"]);
        assert!(*finalized.borrow());
        assert_eq!(archive, b"5.pdf:1|3.pdf:1|7.pdf:1");
        assert_eq!(report.rendered, ["5", "3", "7"]);
        assert_eq!(report.status_line(), "rendered 3 centers");
    }

    #[test]
    fn abort_policy_stops_at_the_failing_group_with_no_archive() {
        let entries = Rc::new(RefCell::new(Vec::new()));
        let finalized = Rc::new(RefCell::new(false));
        let sink = TraceSink {
            entries: entries.clone(),
            finalized: finalized.clone(),
        };
        let result = run_batch(
            &groups(&["5", "3", "7"]),
            "pdf",
            GroupFailurePolicy::Abort,
            sink,
            None,
            |group| {
                if group.key == "3" {
                    Err(RollPressError::InvalidConfiguration(
                        "row spills past the grid".to_string(),
                    ))
                } else {
                    ok_render(group)
                }
            },
        );
        match result {
            Err(RollPressError::Render { key, message }) => {
                assert_eq!(key, "3");
                assert!(message.contains("row spills past the grid"));
            }
            other => panic!("expected Render error, got {other:?}"),
        }
        // The failing run never finalized the sink.
        assert!(!*finalized.borrow());
        assert_eq!(*entries.borrow(), ["5.pdf:1"]);
    }

    #[test]
    fn skip_policy_renders_the_rest_and_reports_the_dropped_key() {
        let entries = Rc::new(RefCell::new(Vec::new()));
        let finalized = Rc::new(RefCell::new(false));
        let sink = TraceSink {
            entries: entries.clone(),
            finalized: finalized.clone(),
        };
        let (_, report) = run_batch(
            &groups(&["5", "3", "7"]),
            "pdf",
            GroupFailurePolicy::SkipAndReport,
            sink,
            None,
            |group| {
                if group.key == "3" {
                    Err(RollPressError::Render {
                        key: "3".to_string(),
                        message: "bad value".to_string(),
                    })
                } else {
                    ok_render(group)
                }
            },
        )
        .unwrap();
        assert_eq!(*entries.borrow(), ["5.pdf:1", "7.pdf:1"]);
        assert_eq!(report.rendered, ["5", "7"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].key, "3");
        assert_eq!(report.status_line(), "rendered 2 centers, skipped 1: 3");
    }

    #[test]
    fn asset_errors_are_fatal_even_under_skip_policy() {
        let entries = Rc::new(RefCell::new(Vec::new()));
        let finalized = Rc::new(RefCell::new(false));
        let sink = TraceSink {
            entries: entries.clone(),
            finalized: finalized.clone(),
        };
        let result = run_batch(
            &groups(&["5", "3", "7"]),
            "pdf",
            GroupFailurePolicy::SkipAndReport,
            sink,
            None,
            |group| {
                if group.key == "3" {
                    Err(RollPressError::Asset(
                        "image \"banner-main\" is not decodable PNG or JPEG data".to_string(),
                    ))
                } else {
                    ok_render(group)
                }
            },
        );
        assert!(matches!(result, Err(RollPressError::Asset(_))));
        // No archive leaves the building: the sink was never finalized.
        assert!(!*finalized.borrow());
        assert_eq!(*entries.borrow(), ["5.pdf:1"]);
    }

    #[test]
    fn empty_group_list_finalizes_an_empty_archive() {
        let entries = Rc::new(RefCell::new(Vec::new()));
        let finalized = Rc::new(RefCell::new(false));
        let sink = TraceSink {
            entries,
            finalized: finalized.clone(),
        };
        let (archive, report) =
            run_batch(&[], "pdf", GroupFailurePolicy::Abort, sink, None, ok_render).unwrap();
        assert!(archive.is_empty());
        assert!(report.rendered.is_empty());
        assert!(*finalized.borrow());
    }
}
