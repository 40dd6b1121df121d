//! CI descriptor templates for pipeline publishing.

use crate::context::EntityState;

/// CI descriptor the platform's git host runs.
pub const CI_FILE: &str = ".gitlab-ci.yml";

/// Default CI descriptor for an entity, triggered by pushes to `branch`.
pub fn ci_template(entity: &EntityState, branch: &str) -> String {
    let job = match entity {
        EntityState::Frontend => FRONTEND_JOB.to_string(),
        EntityState::Backend { platform } => BACKEND_JOB.replace("{platform}", platform),
        EntityState::Wordpress { page, .. } => WORDPRESS_JOB.replace("{page}", page),
    };
    format!(
        "stages:\n  - deploy\n\ndeploy:\n  stage: deploy\n  only:\n    - {}\n{}",
        branch, job
    )
}

const FRONTEND_JOB: &str = r#"  image: node:lts
  cache:
    paths:
      - node_modules/
  script:
    - npm ci
    - npm run build --if-present
  artifacts:
    paths:
      - dist/
"#;

const BACKEND_JOB: &str = r#"  image: docker:stable
  variables:
    MDB_BACKEND_TECHNOLOGY: "{platform}"
  script:
    - echo "Deploying $CI_PROJECT_NAME ($MDB_BACKEND_TECHNOLOGY)"
"#;

const WORDPRESS_JOB: &str = r#"  image: alpine:latest
  variables:
    MDB_WP_PAGE: "{page}"
  script:
    - echo "Deploying WordPress site $CI_PROJECT_NAME"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_target_the_public_branch() {
        let yaml = ci_template(&EntityState::Frontend, "public");
        assert!(yaml.contains("only:\n    - public\n"));
        assert!(yaml.contains("npm run build"));
    }

    #[test]
    fn backend_template_names_platform() {
        let yaml = ci_template(
            &EntityState::Backend {
                platform: "node18".into(),
            },
            "release",
        );
        assert!(yaml.contains(r#"MDB_BACKEND_TECHNOLOGY: "node18""#));
        assert!(yaml.contains("- release"));
    }
}
