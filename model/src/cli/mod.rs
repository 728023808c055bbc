/*!

The cluster CLI is the only way the harness observes or mutates a cluster. A [`Session`] carries
everything a scenario needs to build a command line (kubeconfig, namespace, privilege) and hands
the finished [`Invocation`] to an [`Executor`].

!*/

mod process;

use crate::error::{self, Result};
use async_trait::async_trait;
use snafu::ensure;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use process::{ProcessExecutor, DEFAULT_CLI};

/// Runs a fully assembled CLI [`Invocation`] and reports what happened.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, invocation: &Invocation) -> Result<Output>;
}

/// The argument vector passed to the CLI binary, excluding the program name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The CLI verb, e.g. `get` or `patch`.
    pub fn verb(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

/// The captured result of running the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    /// The exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// # Session
///
/// The per-scenario CLI context. A `Session` is cheap to clone and every view method
/// ([`Session::as_admin`], [`Session::without_namespace`], [`Session::as_guest`]) returns a new
/// value, so a scenario can hand out differently privileged views without mutating shared state.
///
/// ```ignore
/// let out = session
///     .as_admin()
///     .without_namespace()
///     .run("get")
///     .args(["co", "kube-apiserver"])
///     .output()
///     .await?;
/// ```
#[derive(Clone)]
pub struct Session {
    executor: Arc<dyn Executor>,
    kubeconfig: Option<PathBuf>,
    admin_kubeconfig: Option<PathBuf>,
    guest_kubeconfig: Option<PathBuf>,
    namespace: Option<String>,
    admin: bool,
    guest: bool,
    without_namespace: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("kubeconfig", &self.kubeconfig)
            .field("admin_kubeconfig", &self.admin_kubeconfig)
            .field("guest_kubeconfig", &self.guest_kubeconfig)
            .field("namespace", &self.namespace)
            .field("admin", &self.admin)
            .field("guest", &self.guest)
            .field("without_namespace", &self.without_namespace)
            .finish()
    }
}

impl Session {
    pub fn new<E>(executor: E) -> Self
    where
        E: Executor + 'static,
    {
        Self::from_shared(Arc::new(executor))
    }

    pub fn from_shared(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            kubeconfig: None,
            admin_kubeconfig: None,
            guest_kubeconfig: None,
            namespace: None,
            admin: false,
            guest: false,
            without_namespace: false,
        }
    }

    /// The kubeconfig used for regular (non-admin) commands.
    pub fn with_kubeconfig<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.kubeconfig = Some(path.into());
        self
    }

    /// The kubeconfig used after [`Session::as_admin`]. Falls back to the regular kubeconfig.
    pub fn with_admin_kubeconfig<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.admin_kubeconfig = Some(path.into());
        self
    }

    /// The kubeconfig of a hosted (guest) cluster, used after [`Session::as_guest`].
    pub fn with_guest_kubeconfig<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.guest_kubeconfig = Some(path.into());
        self
    }

    pub fn with_namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn as_admin(&self) -> Self {
        Self {
            admin: true,
            ..self.clone()
        }
    }

    pub fn as_guest(&self) -> Self {
        Self {
            guest: true,
            ..self.clone()
        }
    }

    pub fn without_namespace(&self) -> Self {
        Self {
            without_namespace: true,
            ..self.clone()
        }
    }

    /// A view that authenticates with `path`, whatever the admin and guest views would pick.
    pub fn using_kubeconfig<P: Into<PathBuf>>(&self, path: P) -> Self {
        Self {
            kubeconfig: Some(path.into()),
            admin: false,
            guest: false,
            ..self.clone()
        }
    }

    /// Start building a command for `verb`.
    pub fn run<S: Into<String>>(&self, verb: S) -> CommandBuilder<'_> {
        CommandBuilder {
            session: self,
            verb: verb.into(),
            args: Vec::new(),
        }
    }

    fn effective_kubeconfig(&self) -> Option<&Path> {
        if self.guest {
            if let Some(path) = &self.guest_kubeconfig {
                return Some(path);
            }
        }
        if self.admin {
            if let Some(path) = &self.admin_kubeconfig {
                return Some(path);
            }
        }
        self.kubeconfig.as_deref()
    }

    pub(crate) fn invocation(&self, verb: &str, args: &[String]) -> Invocation {
        let mut all = vec![verb.to_string()];
        if let Some(path) = self.effective_kubeconfig() {
            all.push(format!("--kubeconfig={}", path.display()));
        }
        if !self.without_namespace {
            if let Some(namespace) = &self.namespace {
                all.push(format!("--namespace={}", namespace));
            }
        }
        all.extend(args.iter().cloned());
        Invocation { args: all }
    }
}

/// A command under construction, obtained from [`Session::run`].
#[derive(Debug)]
pub struct CommandBuilder<'a> {
    session: &'a Session,
    verb: String,
    args: Vec<String>,
}

impl<'a> CommandBuilder<'a> {
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn invocation(&self) -> Invocation {
        self.session.invocation(&self.verb, &self.args)
    }

    /// Run the command and return its raw [`Output`], whatever the exit status.
    pub async fn outcome(self) -> Result<Output> {
        let invocation = self.invocation();
        log::trace!("running '{}'", invocation);
        self.session.executor.execute(&invocation).await
    }

    /// Run the command and return its trimmed stdout. A non-zero exit status is an error.
    pub async fn output(self) -> Result<String> {
        let invocation = self.invocation();
        log::trace!("running '{}'", invocation);
        let output = self.session.executor.execute(&invocation).await?;
        ensure!(
            output.success(),
            error::CommandFailedSnafu {
                command: invocation.to_string(),
                code: output.code,
                stdout: output.stdout.trim(),
                stderr: output.stderr.trim(),
            }
        );
        Ok(output.stdout.trim().to_string())
    }

    /// Run the command for its side effect only.
    pub async fn execute(self) -> Result<()> {
        self.output().await.map(|_| ())
    }
}
