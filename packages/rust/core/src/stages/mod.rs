//! The concrete audit stages.

mod analyze;
mod discover;
mod issues;
mod project;
mod registry;
mod reports;
mod repository;

pub use analyze::AnalyzeStage;
pub use discover::{DiscoverStage, ResetAnalysisStage};
pub use issues::{CreateIssueStage, FindIssueStage};
pub use project::{FindFrameworksStage, FindReferencesStage};
pub use registry::{DownloadRegistryMetadataStage, FindIconStage};
pub use reports::MarkdownReportStage;
pub use repository::{
    DownloadProjectsStage, FindProjectsStage, FindSolutionStage, ResolveProjectUrlStage,
};

use crate::pipeline::Stage;

/// Every stage of a full audit, in run order.
pub fn standard() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(DiscoverStage),
        Box::new(ResetAnalysisStage),
        Box::new(ResolveProjectUrlStage),
        Box::new(FindSolutionStage),
        Box::new(FindProjectsStage),
        Box::new(DownloadProjectsStage),
        Box::new(DownloadRegistryMetadataStage),
        Box::new(FindReferencesStage),
        Box::new(FindFrameworksStage),
        Box::new(FindIssueStage),
        Box::new(FindIconStage),
        Box::new(AnalyzeStage),
        Box::new(CreateIssueStage),
        Box::new(MarkdownReportStage),
    ]
}

/// In-memory collaborators and a sample population shared by stage tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use url::Url;

    use auditor_discovery::{PackageMetadata, RegistryClient};
    use auditor_github::InMemoryRepoClient;
    use auditor_shared::{AppConfig, AuditError, AuditOptions, Result};

    use crate::pipeline::StageContext;

    pub const ICON: &str = "https://cdn.rawgit.com/cake-contrib/graphics/a5cf0f881c390650144b2243ae551d5b9f836196/png/cake-contrib-medium.png";

    #[derive(Debug, Default)]
    pub struct FakeRegistry {
        packages: Vec<PackageMetadata>,
        project_urls: HashMap<String, Url>,
    }

    impl FakeRegistry {
        pub fn with_package(mut self, package: PackageMetadata) -> Self {
            self.packages.push(package);
            self
        }

        pub fn with_project_url(mut self, package_url: &str, project_url: &str) -> Self {
            if let Ok(url) = Url::parse(project_url) {
                self.project_urls.insert(package_url.to_string(), url);
            }
            self
        }
    }

    #[async_trait]
    impl RegistryClient for FakeRegistry {
        async fn search_by_prefix(
            &self,
            _query: &str,
            take: usize,
            skip: usize,
        ) -> Result<Vec<PackageMetadata>> {
            Ok(self.packages.iter().skip(skip).take(take).cloned().collect())
        }

        async fn get_metadata(&self, name: &str) -> Result<Vec<PackageMetadata>> {
            Ok(self
                .packages
                .iter()
                .filter(|p| p.id.eq_ignore_ascii_case(name))
                .cloned()
                .collect())
        }

        async fn project_url(&self, package_url: &Url) -> Result<Option<Url>> {
            Ok(self.project_urls.get(package_url.as_str()).cloned())
        }

        fn package_url(&self, name: &str) -> Result<Url> {
            Url::parse(&format!("https://www.nuget.org/packages/{name}/"))
                .map_err(|e| AuditError::parse(e.to_string()))
        }
    }

    pub fn package(id: &str, project_url: Option<&str>) -> PackageMetadata {
        PackageMetadata {
            id: id.into(),
            version: "1.0.0".into(),
            title: id.into(),
            description: format!("{id} addin"),
            authors: "someone".into(),
            owners: vec!["someone".into()],
            tags: vec!["cake".into()],
            icon_url: Some(ICON.into()),
            project_url: project_url.map(str::to_string),
            published: None,
        }
    }

    pub fn context(
        dir: &Path,
        github: Arc<InMemoryRepoClient>,
        registry: FakeRegistry,
    ) -> StageContext {
        let config = AppConfig::default();
        let mut options = AuditOptions::from(&config);
        options.temp_dir = dir.to_path_buf();
        StageContext::new(&config, options, github, Arc::new(registry))
            .with_issue_creator("auditor-bot")
    }

    const FOO_SOLUTION: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Cake.Foo", "Cake.Foo\Cake.Foo.csproj", "{11111111-1111-1111-1111-111111111111}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Cake.Foo.Tests", "Cake.Foo.Tests\Cake.Foo.Tests.csproj", "{22222222-2222-2222-2222-222222222222}"
EndProject
"#;

    const FOO_PROJECT: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFramework>netstandard2.0</TargetFramework>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="Cake.Core" Version="0.26.0" PrivateAssets="All" />
  </ItemGroup>
</Project>"#;

    const BAR_SOLUTION: &str = r#"
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "Cake.Bar", "Source\Cake.Bar.csproj", "{33333333-3333-3333-3333-333333333333}"
EndProject
"#;

    const BAR_PROJECT: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFrameworks>net46;netstandard2.0</TargetFrameworks>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="Cake.Common" Version="0.22.0" />
  </ItemGroup>
</Project>"#;

    const STATUS: &str = "# Addins

| Name | Maintainer |
|------|------------|
| [Cake.Foo](https://github.com/someone/Cake.Foo) | someone |
| [Cake.Baz](https://www.nuget.org/packages/Cake.Baz/) | third |
";

    /// Three addins:
    /// - `Cake.Foo`: compliant, listed everywhere
    /// - `Cake.Bar`: registry only, outdated and public reference, multi-targets
    /// - `Cake.Baz`: status list only, repo resolved from the package page
    ///   but missing on GitHub
    pub fn world() -> (InMemoryRepoClient, FakeRegistry) {
        let github = InMemoryRepoClient::new()
            .with_file(
                "cake-build",
                "website",
                "addins/Cake.Foo.yml",
                "Name: Cake.Foo\nRepository: https://github.com/someone/Cake.Foo\nAuthor: someone\n",
            )
            .with_file("cake-contrib", "home", "Status.md", STATUS)
            .with_file("someone", "Cake.Foo", "README.md", "# Cake.Foo")
            .with_file("someone", "Cake.Foo", "Source/Cake.Foo.sln", FOO_SOLUTION)
            .with_file(
                "someone",
                "Cake.Foo",
                "Source/Cake.Foo/Cake.Foo.csproj",
                FOO_PROJECT,
            )
            .with_file("other", "Cake.Bar", "Cake.Bar.sln", BAR_SOLUTION)
            .with_file("other", "Cake.Bar", "Source/Cake.Bar.csproj", BAR_PROJECT);

        let registry = FakeRegistry::default()
            .with_package(package("Cake.Foo", Some("https://github.com/someone/Cake.Foo")))
            .with_package(package("Cake.Bar", Some("https://github.com/other/Cake.Bar")))
            .with_package(package("Unrelated.Package", None))
            .with_project_url(
                "https://www.nuget.org/packages/Cake.Baz/",
                "https://github.com/third/Cake.Baz",
            );

        (github, registry)
    }
}
