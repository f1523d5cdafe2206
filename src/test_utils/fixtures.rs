//! Manifest and vendor-page fixtures shaped like the real tap files.
//!
//! Besides the fields the pipeline rewrites, both manifests carry the
//! constructs that must pass through untouched: comments, `postflight`
//! and `install` logic, heredoc caveats, and `livecheck` blocks with a
//! literal URL and a regex holding quote characters.

use crate::models::{BuildDescriptor, Platform};
use crate::parse::build_artifact_url;

/// A 64-character digest made of one repeated hex character.
pub fn sha(fill: char) -> String {
    fill.to_string().repeat(64)
}

/// Cask at `26-ea+<build>` with arm/intel checksums of the given fills.
pub fn cask(build: u16, arm: char, intel: char) -> String {
    format!(
        r##"cask "openjdk@ea" do
  arch arm: "aarch64", intel: "x64"

  version "26-ea+{build}"
  sha256 arm:   "{arm_sha}",
         intel: "{intel_sha}"

  url "https://download.java.net/java/early_access/jdk26/#{{version.split("+").last}}/GPL/openjdk-#{{version}}_macos-#{{arch}}_bin.tar.gz"
  name "OpenJDK Early Access"
  desc "Early-access builds of the next OpenJDK release"
  homepage "https://jdk.java.net/26/"

  livecheck do
    url "https://jdk.java.net/26/"
    regex(/openjdk[._-]v?(\d+)["' >]/i)
  end

  # Register with /usr/libexec/java_home
  postflight do
    system_command "/bin/ln",
                   args: ["-nsf", "#{{staged_path}}/jdk-26.jdk", "/Library/Java/JavaVirtualMachines/openjdk-ea.jdk"],
                   sudo: true
  end

  caveats <<~EOS
    This is an early-access build; it isn't meant for production use.
    if you need a stable JDK, install the "openjdk" cask instead.
  EOS
end
"##,
        arm_sha = sha(arm),
        intel_sha = sha(intel),
    )
}

/// Formula at `26-ea+<build>`; `fills` follow [`Platform::ALL`] order.
pub fn formula(build: u16, fills: [char; 4]) -> String {
    let descriptor = BuildDescriptor::new(build).expect("fixture build is in range");
    let url = |p: Platform| build_artifact_url(&descriptor, p);
    let [ma, mx, la, lx] = fills;

    format!(
        r##"class OpenjdkAtEa < Formula
  desc "Early-access builds of the next OpenJDK release"
  homepage "https://jdk.java.net/26/"
  version "{version}"
  license "GPL-2.0-only" => {{ with: "Classpath-exception-2.0" }}

  on_macos do
    on_arm do
      url "{mac_arm}"
      sha256 "{ma_sha}"
    end
    on_intel do
      url "{mac_x64}"
      sha256 "{mx_sha}"
    end
  end

  on_linux do
    on_arm do
      url "{linux_arm}"
      sha256 "{la_sha}"
    end
    on_intel do
      url "{linux_x64}"
      sha256 "{lx_sha}"
    end
  end

  livecheck do
    url "https://jdk.java.net/26/"
    regex(/href=.*?openjdk-(\d+)-ea\+(\d+)_[^"' >]+/i)
  end

  keg_only :versioned_formula

  def install
    # macOS archives nest the JDK inside a bundle
    if OS.mac?
      libexec.install Dir["jdk-26.jdk/Contents/Home/*"]
    else
      libexec.install Dir["*"]
    end
    bin.install_symlink Dir["#{{libexec}}/bin/*"]
  end

  def caveats
    <<~EOS
      Early-access builds aren't supported for production use.
      unless you pin this formula, `brew upgrade` moves it to every new build.
    EOS
  end

  test do
    system bin/"java", "-version"
  end
end
"##,
        version = descriptor.version(),
        mac_arm = url(Platform::MacosArm64),
        mac_x64 = url(Platform::MacosX64),
        linux_arm = url(Platform::LinuxArm64),
        linux_x64 = url(Platform::LinuxX64),
        ma_sha = sha(ma),
        mx_sha = sha(mx),
        la_sha = sha(la),
        lx_sha = sha(lx),
    )
}

/// Minimal vendor page announcing `build`.
pub fn vendor_page(build: &str) -> String {
    format!(
        "<html><body><h1>JDK 26 Early-Access Builds</h1>\n\
         <p>Build {build} (2025/10/30)</p>\n\
         <p>Older builds: Build 1</p></body></html>\n"
    )
}
