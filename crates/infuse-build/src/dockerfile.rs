use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};

use crate::context::BuildContext;

/// Build secret id of the `k`-th sensitive asset.
pub fn secret_id(k: usize) -> String {
    format!("asset{k}")
}

/// Generates the two-stage Dockerfile that copies a build context onto a
/// base image.
///
/// Stage 0 runs on a small utility image: it copies the base image's user
/// database so symbolic `chown` resolves, lays out the context, decodes
/// secrets and applies permissions. Stage 1 copies the result onto the base.
pub struct DockerfileGenerator<'a> {
    base: &'a str,
    helper_image: &'a str,
    context: &'a BuildContext,
}

impl<'a> DockerfileGenerator<'a> {
    pub fn new(base: &'a str, helper_image: &'a str, context: &'a BuildContext) -> Self {
        Self {
            base,
            helper_image,
            context,
        }
    }

    pub fn render(&self) -> String {
        let contextdir = self.context.contextdir.display();
        let assets = &self.context.assets;
        // chown only applies when every asset names an owner
        let chown = !assets.is_empty() && assets.iter().all(|asset| asset.owner.is_some());

        let mut runs = Vec::new();
        let mut secret_idx = 0;
        for asset in assets {
            let destination = self.context.target_path(&asset.destination);

            if asset.is_sensitive() {
                let parent = destination
                    .parent()
                    .unwrap_or(self.context.contextdir.as_path());
                let id = secret_id(secret_idx);
                runs.push(format!("RUN mkdir -p {}", parent.display()));
                runs.push(format!(
                    "RUN --mount=type=secret,id={id} base64 -d /run/secrets/{id} > {}",
                    destination.display()
                ));
                secret_idx += 1;
            }

            if let Some(mode) = asset.mode {
                runs.push(format!("RUN chmod {mode:o} {}", destination.display()));
            }

            if let (true, Some(owner)) = (chown, &asset.owner) {
                runs.push(format!("RUN chown {owner} {}", destination.display()));
            }
        }

        format!(
            "FROM {helper}
COPY --from={base} /etc/passwd /etc/group /etc/
COPY . {contextdir}
{runs}

FROM {base}
COPY --from=0 {contextdir} /",
            helper = self.helper_image,
            base = self.base,
            runs = runs.join("\n"),
        )
    }

    /// Build secrets, `asset<k>` → base64 of the plaintext, in declaration
    /// order of the sensitive assets.
    pub fn secrets(&self) -> BTreeMap<String, SecretString> {
        self.context
            .sensitive_assets()
            .filter_map(|asset| asset.sensitive.as_ref())
            .enumerate()
            .map(|(k, content)| {
                let encoded = STANDARD.encode(content.expose_secret());
                (secret_id(k), SecretString::from(encoded))
            })
            .collect()
    }
}
