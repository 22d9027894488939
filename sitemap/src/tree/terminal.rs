//! Nodes that place components on the pipeline or end the request.

use super::views::jump_to_view;
use super::{locate, InvokeContext, ViewBinding};
use crate::components::{Generator, Reader, Serializer, Transformer};
use crate::config::Location;
use crate::core::Parameters;
use crate::environment::Environment;
use crate::errors::SitemapResult;
use crate::pipeline::PipelineStep;
use crate::variables::{MapStack, ParameterTemplate, VariableResolver};
use std::sync::Arc;

/// What every component node resolves per request.
pub struct ComponentBinding {
    type_name: String,
    source: Option<VariableResolver>,
    parameters: ParameterTemplate,
}

impl ComponentBinding {
    /// Creates a binding.
    #[must_use]
    pub const fn new(
        type_name: String,
        source: Option<VariableResolver>,
        parameters: ParameterTemplate,
    ) -> Self {
        Self {
            type_name,
            source,
            parameters,
        }
    }

    fn step<T: ?Sized>(
        &self,
        component: &Arc<T>,
        maps: &MapStack,
        env: &Environment,
    ) -> SitemapResult<PipelineStep<T>> {
        let source = self
            .source
            .as_ref()
            .map(|source| source.resolve(maps, env))
            .transpose()?;
        let parameters: Parameters = self.parameters.resolve(maps, env)?;
        Ok(PipelineStep::new(self.type_name.clone(), component.clone())
            .with_source(source)
            .with_parameters(parameters))
    }
}

fn resolve_optional(
    value: Option<&VariableResolver>,
    maps: &MapStack,
    env: &Environment,
) -> SitemapResult<Option<String>> {
    Ok(value
        .map(|value| value.resolve(maps, env))
        .transpose()?
        .filter(|value| !value.is_empty()))
}

/// Completes the pipeline: executes it unless only building.
async fn complete(env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
    if ctx.is_build_only() {
        return Ok(true);
    }
    ctx.pipeline().process(env).await
}

/// `generate`: sets the generator, then jumps to a requested view.
pub struct GenerateNode {
    binding: ComponentBinding,
    generator: Arc<dyn Generator>,
    views: ViewBinding,
    pub(crate) location: Location,
}

impl GenerateNode {
    /// Creates a generate node.
    #[must_use]
    pub const fn new(
        binding: ComponentBinding,
        generator: Arc<dyn Generator>,
        views: ViewBinding,
        location: Location,
    ) -> Self {
        Self {
            binding,
            generator,
            views,
            location,
        }
    }

    pub(crate) async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        let step = self
            .binding
            .step(&self.generator, ctx.maps(), env)
            .map_err(|e| locate(e, &self.location))?;
        ctx.pipeline_mut()
            .set_generator(step)
            .map_err(|e| locate(e, &self.location))?;
        jump_to_view(&self.views, env, ctx).await
    }
}

/// `transform`: appends a transformer, then jumps to a requested view.
pub struct TransformNode {
    binding: ComponentBinding,
    transformer: Arc<dyn Transformer>,
    views: ViewBinding,
    pub(crate) location: Location,
}

impl TransformNode {
    /// Creates a transform node.
    #[must_use]
    pub const fn new(
        binding: ComponentBinding,
        transformer: Arc<dyn Transformer>,
        views: ViewBinding,
        location: Location,
    ) -> Self {
        Self {
            binding,
            transformer,
            views,
            location,
        }
    }

    pub(crate) async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        let step = self
            .binding
            .step(&self.transformer, ctx.maps(), env)
            .map_err(|e| locate(e, &self.location))?;
        ctx.pipeline_mut()
            .add_transformer(step)
            .map_err(|e| locate(e, &self.location))?;
        jump_to_view(&self.views, env, ctx).await
    }
}

/// `serialize`: sets the serializer and completes the pipeline, unless a
/// requested view takes over first.
pub struct SerializeNode {
    binding: ComponentBinding,
    serializer: Arc<dyn Serializer>,
    mime_type: Option<VariableResolver>,
    status_code: Option<u16>,
    views: ViewBinding,
    pub(crate) location: Location,
}

impl SerializeNode {
    /// Creates a serialize node.
    #[must_use]
    pub const fn new(
        binding: ComponentBinding,
        serializer: Arc<dyn Serializer>,
        mime_type: Option<VariableResolver>,
        status_code: Option<u16>,
        views: ViewBinding,
        location: Location,
    ) -> Self {
        Self {
            binding,
            serializer,
            mime_type,
            status_code,
            views,
            location,
        }
    }

    pub(crate) async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        if let Some(view) = self.views.view_for(env.view().as_deref()) {
            return view.invoke(env, ctx).await;
        }
        let mime_type = resolve_optional(self.mime_type.as_ref(), ctx.maps(), env)?;
        let step = self
            .binding
            .step(&self.serializer, ctx.maps(), env)
            .map_err(|e| locate(e, &self.location))?
            .with_mime_type(mime_type);
        let pipeline = ctx.pipeline_mut();
        pipeline
            .set_serializer(step)
            .map_err(|e| locate(e, &self.location))?;
        pipeline.set_status_code(self.status_code);
        complete(env, ctx).await
    }
}

/// `read`: sets a reader and completes the pipeline.
pub struct ReadNode {
    binding: ComponentBinding,
    reader: Arc<dyn Reader>,
    mime_type: Option<VariableResolver>,
    status_code: Option<u16>,
    pub(crate) location: Location,
}

impl ReadNode {
    /// Creates a read node.
    #[must_use]
    pub const fn new(
        binding: ComponentBinding,
        reader: Arc<dyn Reader>,
        mime_type: Option<VariableResolver>,
        status_code: Option<u16>,
        location: Location,
    ) -> Self {
        Self {
            binding,
            reader,
            mime_type,
            status_code,
            location,
        }
    }

    pub(crate) async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        let mime_type = resolve_optional(self.mime_type.as_ref(), ctx.maps(), env)?;
        let step = self
            .binding
            .step(&self.reader, ctx.maps(), env)
            .map_err(|e| locate(e, &self.location))?
            .with_mime_type(mime_type);
        tracing::debug!(reader = %step.type_name, source = ?step.source, "Reading");
        let pipeline = ctx.pipeline_mut();
        pipeline
            .set_reader(step)
            .map_err(|e| locate(e, &self.location))?;
        pipeline.set_status_code(self.status_code);
        complete(env, ctx).await
    }
}

/// `redirect-to`: sends the request elsewhere.
pub struct RedirectNode {
    uri: VariableResolver,
    permanent: bool,
    pub(crate) location: Location,
}

impl RedirectNode {
    /// Creates a redirect node.
    #[must_use]
    pub const fn new(uri: VariableResolver, permanent: bool, location: Location) -> Self {
        Self {
            uri,
            permanent,
            location,
        }
    }

    pub(crate) async fn invoke(&self, env: &Environment, ctx: &mut InvokeContext) -> SitemapResult<bool> {
        let uri = self
            .uri
            .resolve(ctx.maps(), env)
            .map_err(|e| locate(e, &self.location))?;
        let redirector = ctx.redirector()?;
        if ctx.is_build_only() {
            let pipeline = redirector
                .build_forward(env, &uri)
                .await
                .map_err(|e| locate(e, &self.location))?;
            ctx.set_pipeline(pipeline);
            return Ok(true);
        }
        redirector
            .redirect(env, &uri, self.permanent)
            .await
            .map_err(|e| locate(e, &self.location))?;
        Ok(true)
    }
}
