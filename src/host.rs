//! 主机原语：启动应用、读取系统信息
//!
//! 工具只依赖 AppLauncher / SystemProbe 两个 trait，测试时可替换为桩实现；
//! SystemHost 为真实实现（tokio::process 启动应用，sysinfo 读取内存与 CPU）。

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Serialize;
use sysinfo::System;
use tokio::process::Command;

/// 应用名中不允许出现的字符（Windows 下经 cmd 转发，避免被当成命令分隔）
const FORBIDDEN_CHARS: &[char] = &['&', '|', '<', '>', '^', '"', ';', '\n', '\r'];

/// 主机系统信息快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostMetrics {
    pub platform: String,
    pub release: String,
    pub total_memory_bytes: u64,
    pub free_memory_bytes: u64,
    pub cpu_model: String,
    pub cpu_cores: usize,
}

/// 按名称启动本机应用；只关心成功与否，失败时返回原因
#[async_trait]
pub trait AppLauncher: Send + Sync {
    async fn launch(&self, app_name: &str) -> Result<(), String>;
}

/// 读取主机系统信息（同步，调用方负责放到阻塞线程）
pub trait SystemProbe: Send + Sync {
    fn metrics(&self) -> HostMetrics;
}

/// 真实主机实现
#[derive(Debug, Default, Clone)]
pub struct SystemHost;

impl SystemHost {
    pub fn new() -> Self {
        Self
    }
}

fn validate_app_name(app_name: &str) -> Result<&str, String> {
    let name = app_name.trim();
    if name.is_empty() {
        return Err("empty application name".to_string());
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(format!("forbidden character {:?} in application name", c));
    }
    Ok(name)
}

/// Linux 下应用名的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
enum LinuxTarget {
    /// PATH 中的可执行文件
    Executable(PathBuf),
    /// 桌面条目 id（applications/<id>.desktop），交给 gtk-launch
    DesktopEntry(String),
}

/// "Text Editor" 依次尝试 "Text Editor"、"text editor"、"text-editor"
fn name_variants(name: &str) -> Vec<String> {
    let lower = name.to_lowercase();
    let dashed = lower.replace(' ', "-");
    let mut variants = vec![name.to_string()];
    for v in [lower, dashed] {
        if !variants.contains(&v) {
            variants.push(v);
        }
    }
    variants
}

fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.is_file() && meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        meta.is_file()
    }
}

fn find_executable(path_var: &OsStr, name: &str) -> Option<PathBuf> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        return is_executable(&path).then_some(path);
    }
    let variants = name_variants(name);
    std::env::split_paths(path_var).find_map(|dir| {
        variants
            .iter()
            .map(|v| dir.join(v))
            .find(|candidate| is_executable(candidate))
    })
}

/// 在 <data_dir>/applications 下按文件名或 Name= 查找桌面条目
fn find_desktop_entry(data_dirs: &[PathBuf], name: &str) -> Option<String> {
    let variants = name_variants(name);
    for dir in data_dirs {
        let Ok(entries) = std::fs::read_dir(dir.join("applications")) else {
            continue;
        };
        let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        paths.sort();
        for path in paths {
            if path.extension().and_then(OsStr::to_str) != Some("desktop") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(OsStr::to_str) else {
                continue;
            };
            if variants.iter().any(|v| v.eq_ignore_ascii_case(id)) {
                return Some(id.to_string());
            }
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let named = content
                .lines()
                .filter_map(|l| l.strip_prefix("Name="))
                .any(|n| n.trim().eq_ignore_ascii_case(name));
            if named {
                return Some(id.to_string());
            }
        }
    }
    None
}

/// XDG_DATA_HOME 与 XDG_DATA_DIRS（未设置时用 freedesktop 默认值）
fn xdg_data_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    match std::env::var_os("XDG_DATA_HOME") {
        Some(home) if !home.is_empty() => dirs.push(PathBuf::from(home)),
        _ => {
            if let Some(home) = std::env::var_os("HOME") {
                dirs.push(PathBuf::from(home).join(".local/share"));
            }
        }
    }
    match std::env::var_os("XDG_DATA_DIRS") {
        Some(v) if !v.is_empty() => dirs.extend(std::env::split_paths(&v)),
        _ => dirs.extend([PathBuf::from("/usr/local/share"), PathBuf::from("/usr/share")]),
    }
    dirs
}

fn resolve_linux_target(name: &str, path_var: &OsStr, data_dirs: &[PathBuf]) -> Option<LinuxTarget> {
    find_executable(path_var, name)
        .map(LinuxTarget::Executable)
        .or_else(|| find_desktop_entry(data_dirs, name).map(LinuxTarget::DesktopEntry))
}

#[async_trait]
impl AppLauncher for SystemHost {
    async fn launch(&self, app_name: &str) -> Result<(), String> {
        let name = validate_app_name(app_name)?;
        tracing::info!(app = %name, "launching application");

        if cfg!(target_os = "macos") {
            let output = Command::new("open")
                .args(["-a", name])
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| e.to_string())?;
            if output.status.success() {
                Ok(())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(format!("{} ({})", stderr.trim(), output.status))
            }
        } else if cfg!(target_os = "windows") {
            let status = Command::new("cmd")
                .args(["/C", "start", "", name])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| e.to_string())?;
            if status.success() {
                Ok(())
            } else {
                Err(format!("start exited with {}", status))
            }
        } else {
            // 其余平台：先找 PATH 中的可执行文件，再找桌面条目；可执行文件不等待其退出
            let path_var = std::env::var_os("PATH").unwrap_or_default();
            match resolve_linux_target(name, &path_var, &xdg_data_dirs()) {
                Some(LinuxTarget::Executable(path)) => Command::new(path)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                Some(LinuxTarget::DesktopEntry(id)) => {
                    tracing::debug!(app = %name, desktop_entry = %id, "launching via gtk-launch");
                    let output = Command::new("gtk-launch")
                        .arg(&id)
                        .stdin(Stdio::null())
                        .output()
                        .await
                        .map_err(|e| format!("gtk-launch unavailable: {}", e))?;
                    if output.status.success() {
                        Ok(())
                    } else {
                        let stderr = String::from_utf8_lossy(&output.stderr);
                        Err(format!("{} ({})", stderr.trim(), output.status))
                    }
                }
                None => Err(format!("no executable or desktop entry named {:?}", name)),
            }
        }
    }
}

impl SystemProbe for SystemHost {
    fn metrics(&self) -> HostMetrics {
        let sys = System::new_all();
        let cpu_model = sys
            .cpus()
            .first()
            .map(|c| c.brand().trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());

        HostMetrics {
            platform: std::env::consts::OS.to_string(),
            release: System::kernel_version()
                .or_else(System::os_version)
                .unwrap_or_else(|| "Unknown".to_string()),
            total_memory_bytes: sys.total_memory(),
            free_memory_bytes: sys.available_memory(),
            cpu_model,
            cpu_cores: sys.cpus().len(),
        }
    }
}
