//! Content audit - a rendered file plus its attributes

use crate::atomic::StagedFile;
use crate::mode::{apply_attributes, FileAttributes};
use crate::probe;
use hostguard_common::digest::short_digest;
use hostguard_core::{Audit, AuditIdentity, AuditKind, ComplianceStatus, Result};
use hostguard_policy::{Renderer, TemplateContext};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Keeps `path` byte-identical to a rendered template with the given attributes
#[derive(Clone)]
pub struct ContentAudit {
    identity: AuditIdentity,
    path: PathBuf,
    template: String,
    context: TemplateContext,
    attrs: FileAttributes,
    renderer: Arc<dyn Renderer>,
}

impl ContentAudit {
    pub fn new(
        path: impl Into<PathBuf>,
        template: impl Into<String>,
        context: TemplateContext,
        attrs: FileAttributes,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        let path = path.into();
        Self {
            identity: AuditIdentity::new(AuditKind::Content, path.display().to_string()),
            path,
            template: template.into(),
            context,
            attrs,
            renderer,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn context(&self) -> &TemplateContext {
        &self.context
    }

    fn expected(&self) -> Result<Vec<u8>> {
        self.renderer.render(&self.template, &self.context)
    }
}

impl std::fmt::Debug for ContentAudit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentAudit")
            .field("path", &self.path)
            .field("template", &self.template)
            .field("attrs", &self.attrs)
            .finish()
    }
}

impl Audit for ContentAudit {
    fn identity(&self) -> &AuditIdentity {
        &self.identity
    }

    fn check(&self) -> Result<ComplianceStatus> {
        let expected = self.expected()?;

        let state = probe::file_state(&self.path)?;
        if state.is_some_and(|s| s.is_symlink) {
            return Ok(ComplianceStatus::drift(vec!["is a symlink".into()]));
        }

        let Some(actual) = probe::file_content(&self.path)? else {
            return Ok(ComplianceStatus::drift(vec!["file is missing".into()]));
        };

        let mut details = Vec::new();
        if actual != expected {
            details.push(format!(
                "content {} != {}",
                short_digest(&actual),
                short_digest(&expected)
            ));
        }
        if let Some(state) = state {
            details.extend(self.attrs.drift(&state));
        }
        Ok(ComplianceStatus::drift(details))
    }

    fn remediate(&self) -> Result<()> {
        let expected = self.expected()?;

        // a symlink is replaced by a regular file, never fixed through the link
        let is_symlink = probe::file_state(&self.path)?.is_some_and(|s| s.is_symlink);
        if !is_symlink && probe::file_content(&self.path)?.as_deref() == Some(expected.as_slice()) {
            debug!("{}: content matches, fixing attributes only", self.path.display());
            return apply_attributes(&self.path, &self.attrs);
        }

        StagedFile::stage(&self.path, &expected, &self.attrs)?.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::ModeRule;
    use hostguard_core::{Error, Outcome};
    use hostguard_policy::{PolicyValue, TemplateRenderer};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    struct BrokenRenderer;

    impl Renderer for BrokenRenderer {
        fn render(&self, template: &str, _context: &TemplateContext) -> Result<Vec<u8>> {
            Err(Error::Render {
                template: template.to_string(),
                message: "undefined variable 'ttys'".into(),
            })
        }
    }

    fn securetty_audit(path: PathBuf, renderer: Arc<dyn Renderer>) -> ContentAudit {
        let mut context = TemplateContext::new();
        context.insert(
            "ttys".into(),
            PolicyValue::List(vec!["console".into(), "tty1".into()]),
        );
        ContentAudit::new(
            path,
            "securetty",
            context,
            FileAttributes::new(ModeRule::Exact(0o400)),
            renderer,
        )
    }

    #[test]
    fn test_writes_then_converges() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("securetty");
        fs::write(&path, b"tty7\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let audit = securetty_audit(path.clone(), Arc::new(TemplateRenderer::new()));
        let status = audit.check().unwrap();
        assert_eq!(status.details.len(), 2);

        assert_eq!(audit.ensure_compliance().unwrap(), Outcome::Remediated);
        assert!(fs::read_to_string(&path).unwrap().ends_with("console\ntty1\n"));
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o7777, 0o400);
        assert_eq!(audit.ensure_compliance().unwrap(), Outcome::Compliant);
    }

    #[test]
    fn test_missing_file_is_created() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("securetty");
        let audit = securetty_audit(path.clone(), Arc::new(TemplateRenderer::new()));

        assert_eq!(audit.check().unwrap().details, vec!["file is missing".to_string()]);
        assert_eq!(audit.ensure_compliance().unwrap(), Outcome::Remediated);
        assert!(path.exists());
    }

    #[test]
    fn test_attribute_only_drift_keeps_content() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("securetty");
        let audit = securetty_audit(path.clone(), Arc::new(TemplateRenderer::new()));
        audit.ensure_compliance().unwrap();

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        let inode = std::os::unix::fs::MetadataExt::ino(&fs::metadata(&path).unwrap());

        assert_eq!(audit.ensure_compliance().unwrap(), Outcome::Remediated);
        // fixed in place, not rewritten
        assert_eq!(
            std::os::unix::fs::MetadataExt::ino(&fs::metadata(&path).unwrap()),
            inode
        );
    }

    #[test]
    fn test_symlinked_target_is_replaced() {
        let tmp_dir = TempDir::new().unwrap();
        let real = tmp_dir.path().join("securetty.real");
        let path = tmp_dir.path().join("securetty");
        let audit = securetty_audit(real.clone(), Arc::new(TemplateRenderer::new()));
        audit.ensure_compliance().unwrap();
        fs::set_permissions(&real, fs::Permissions::from_mode(0o644)).unwrap();
        std::os::unix::fs::symlink(&real, &path).unwrap();

        let audit = securetty_audit(path.clone(), Arc::new(TemplateRenderer::new()));
        assert_eq!(audit.check().unwrap().details, vec!["is a symlink".to_string()]);

        assert_eq!(audit.ensure_compliance().unwrap(), Outcome::Remediated);
        assert!(!fs::symlink_metadata(&path).unwrap().file_type().is_symlink());
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o7777, 0o400);
        // the old link target is left alone
        assert_eq!(fs::metadata(&real).unwrap().permissions().mode() & 0o7777, 0o644);
        assert_eq!(audit.ensure_compliance().unwrap(), Outcome::Compliant);
    }

    #[test]
    fn test_render_error_is_failed_outcome() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("securetty");
        let audit = securetty_audit(path.clone(), Arc::new(BrokenRenderer));

        match audit.ensure_compliance().unwrap() {
            Outcome::Failed(reason) => assert!(reason.contains("securetty")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!path.exists());
    }
}
