//! Module-level bytecode generation
//!
//! [`BytecodeModuleGenerator`] drives a whole module through the backend:
//!
//! 1. Lower every function.
//! 2. Assign bytecode IDs to the functions being emitted (all of them, or
//!    the entry point plus one segment).
//! 3. Collect strings and serialize literal buffers.
//! 4. Per function: allocate registers, run register-dependent lowering,
//!    select instructions and finalize the bytecode.
//!
//! Generation is all-or-nothing. If any function fails to encode, no module
//! is returned.

use super::backend::{CodegenBackend, RegisterAllocator, SelectionContext};
use crate::analysis::reverse_post_order;
use crate::bytecode::{
    BytecodeFunction, BytecodeFunctionGenerator, BytecodeModule, BytecodeOptions,
    DebugInfoGenerator, DebugOffsets, DynamicCjsModule, FileAndSourceMapIdCache, FunctionHeader,
    FunctionHeaderFlags, LiteralBufferBuilder, SourceTextEncoder, StaticCjsModule,
    StringAccumulator, StringTable,
};
use crate::config::BytecodeGenerationOptions;
use crate::error::GenerationError;
use crate::ir::{FunctionId, FunctionKind, Module, OperandRole};
use crate::lower::LoweringPipeline;
use rustc_hash::FxHashMap;

/// Name every function gets when function names are stripped
pub const STRIPPED_FUNCTION_NAME: &str = "function-name-stripped";

/// Generates a [`BytecodeModule`] from an IR [`Module`]
pub struct BytecodeModuleGenerator<'m, B: CodegenBackend> {
    module: &'m mut Module,
    backend: B,
    options: BytecodeGenerationOptions,
    pipeline: LoweringPipeline,
    base_strings: Option<StringTable>,
    /// Bytecode IDs in assignment order
    functions: Vec<FunctionId>,
    function_ids: FxHashMap<FunctionId, u32>,
    has_async: bool,
    /// Re-encoded source text, shared by string collection and the source table
    source_encoder: SourceTextEncoder,
}

impl<'m, B: CodegenBackend> BytecodeModuleGenerator<'m, B> {
    /// Create a generator with the default lowering pipeline
    pub fn new(module: &'m mut Module, backend: B, options: BytecodeGenerationOptions) -> Self {
        let pipeline = LoweringPipeline::new(&options);
        Self {
            module,
            backend,
            options,
            pipeline,
            base_strings: None,
            functions: Vec::new(),
            function_ids: FxHashMap::default(),
            has_async: false,
            source_encoder: SourceTextEncoder::new(),
        }
    }

    /// Replace the lowering pipeline
    pub fn with_pipeline(mut self, pipeline: LoweringPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Seed the string table from a previously generated module so that its
    /// strings keep their IDs
    pub fn with_base_string_table(mut self, table: StringTable) -> Self {
        self.base_strings = Some(table);
        self
    }

    /// Register a function for emission and return its bytecode ID.
    /// Registering a function again returns the ID it already has.
    pub fn add_function(&mut self, func: FunctionId) -> u32 {
        if let Some(&id) = self.function_ids.get(&func) {
            return id;
        }
        let id = self.functions.len() as u32;
        self.functions.push(func);
        self.function_ids.insert(func, id);
        self.has_async |= self.module.function(func).kind == FunctionKind::Async;
        id
    }

    /// Whether any registered function is async
    pub fn has_async(&self) -> bool {
        self.has_async
    }

    /// Build the string table of the registered functions
    pub fn collect_strings(&mut self) -> StringTable {
        let mut acc = match &self.base_strings {
            Some(base) => StringAccumulator::with_base(base),
            None => StringAccumulator::new(),
        };
        let literals = &self.module.literals;

        if self.options.strip_function_names {
            acc.add_string(STRIPPED_FUNCTION_NAME, false);
        }
        for &id in &self.functions {
            let func = self.module.function(id);
            for inst in func.instructions() {
                for operand in func.kind(inst).operands() {
                    if let Some(text) = literals.of(operand.value).and_then(|l| l.as_str()) {
                        acc.add_string(text, operand.role == OperandRole::Identifier);
                    }
                }
            }
            if !self.options.strip_function_names {
                acc.add_string(&func.name, false);
            }
            if let Some(source) = func.source_representation.as_deref().filter(|_| !func.global_scope) {
                acc.add_bytes(self.source_encoder.encode(source), false);
            }
            if !self.module.cjs_modules_resolved {
                if let Some(cjs) = self.module.find_cjs_module(id) {
                    acc.add_string(&cjs.filename, false);
                }
            }
        }
        acc.to_table(self.options.optimization_enabled)
    }

    fn assign_ids(&mut self, entry: FunctionId, segment: Option<u32>) {
        let all: Vec<FunctionId> = self.module.function_ids().collect();
        match segment {
            Some(segment) => {
                let members = self.module.functions_in_segment(segment).cloned().unwrap_or_default();
                for id in all {
                    if id == entry || members.contains(&id) {
                        self.add_function(id);
                    }
                }
            }
            None => {
                for id in all {
                    self.add_function(id);
                }
            }
        }
    }

    /// Generate the bytecode module with `entry` as its entry point. With a
    /// `segment`, only the entry point and the functions of that segment are
    /// emitted.
    ///
    /// # Panics
    ///
    /// Panics if a function that was never compiled (lazy) is emitted.
    pub fn generate(
        mut self,
        entry: FunctionId,
        segment: Option<u32>,
    ) -> Result<BytecodeModule, GenerationError> {
        if entry.index() >= self.module.function_count() {
            return Err(GenerationError::MissingEntryPoint(entry));
        }

        self.pipeline.run(self.module);
        self.assign_ids(entry, segment);
        let entry_point_index = self.add_function(entry);

        for &id in &self.functions {
            let func = self.module.function(id);
            if func.lazy {
                panic!("lazy function '{}' reached bytecode generation", func.name);
            }
        }

        let strings = self.collect_strings();
        let buffers = LiteralBufferBuilder::build(
            self.module,
            &strings,
            self.options.optimization_enabled,
            |f| self.function_ids.contains_key(&f),
        )?;

        let mut output = BytecodeModule::new(self.functions.len());
        output.options = BytecodeOptions {
            has_async: self.has_async,
            cjs_modules_statically_resolved: self.module.cjs_modules_resolved,
        };
        output.entry_point_index = entry_point_index;
        output.segment_id = segment.unwrap_or(0);

        for cjs in self.module.cjs_modules() {
            let Some(&function_id) = self.function_ids.get(&cjs.function) else {
                continue;
            };
            if self.module.cjs_modules_resolved {
                output.cjs_static.push(StaticCjsModule { module_id: cjs.id, function_id });
            } else {
                let filename_id = strings
                    .id_of(&cjs.filename)
                    .ok_or_else(|| GenerationError::MissingString(cjs.filename.clone()))?;
                output.cjs_dynamic.push(DynamicCjsModule { function_id, filename_id });
            }
        }

        let Self { module, mut backend, options, functions, function_ids, mut source_encoder, .. } =
            self;
        let mut file_ids = FileAndSourceMapIdCache::new();
        let mut debug_info = DebugInfoGenerator::new();
        let mut has_debug_info = false;

        for (bytecode_id, &id) in functions.iter().enumerate() {
            let bytecode_id = bytecode_id as u32;

            let mut allocator = backend.register_allocator(module.function(id));
            if !options.optimization_enabled {
                allocator.set_fast_pass_threshold(options.fast_allocation_threshold);
                allocator.set_memory_limit(options.allocation_memory_limit);
            }
            let order = reverse_post_order(module.function(id));
            allocator.allocate(module.function(id), &order);
            backend.lower_allocated(module.function_mut(id), &mut allocator, &options);

            let func = module.function(id);
            let mut sink = BytecodeFunctionGenerator::new(allocator.max_register_usage());
            sink.set_source_location(func.location);
            let lexical_parent = func.lexical_parent.and_then(|p| function_ids.get(&p).copied());
            sink.set_lexical_data(lexical_parent, func.variables.clone());

            {
                let mut ctx = SelectionContext {
                    function: id,
                    module: &*module,
                    strings: &strings,
                    buffers: &buffers,
                    function_ids: &function_ids,
                    file_ids: &mut file_ids,
                    debug_info: &mut debug_info,
                };
                backend.select_instructions(func, &allocator, &mut sink, &mut ctx)?;
            }

            if sink.has_encoding_error() {
                tracing::error!(
                    target: "tern::bcgen",
                    function = %func.name,
                    "failed to encode function"
                );
                let (name, location) = (func.name.clone(), func.location);
                module.report_error(location, "Error encoding bytecode");
                return Err(GenerationError::Encoding { function: name });
            }
            // Backends without a jump table may leave finalization to us.
            if !sink.is_complete() {
                sink.bytecode_generation_complete();
            }

            let name = if options.strip_function_names { STRIPPED_FUNCTION_NAME } else { func.name.as_str() };
            let function_name = strings
                .id_of(name)
                .ok_or_else(|| GenerationError::MissingString(name.to_string()))?;

            let debug_offsets = sink.has_debug_info().then(|| DebugOffsets {
                source_locations: debug_info.append_source_locations(
                    sink.source_location(),
                    bytecode_id,
                    sink.debug_locations(),
                ),
                lexical_data: debug_info
                    .append_lexical_data(sink.lexical_parent_id(), sink.variable_names()),
            });

            if let Some(source) = func.source_representation.as_deref().filter(|_| !func.global_scope) {
                let string_id = strings
                    .id_of_bytes(source_encoder.encode(source))
                    .ok_or_else(|| GenerationError::MissingString(source.to_string()))?;
                output.function_source_table.push((bytecode_id, string_id));
            }

            let mut header = FunctionHeader {
                bytecode_size_in_bytes: sink.bytecode_size(),
                param_count: func.expected_param_count_including_this(),
                frame_size: sink.frame_size(),
                function_name,
                highest_read_cache_index: sink.highest_read_cache_index(),
                highest_write_cache_index: sink.highest_write_cache_index(),
                flags: FunctionHeaderFlags {
                    prohibit_invoke: func.prohibit_invoke,
                    strict_mode: func.strict,
                    has_exception_handler: false,
                    has_debug_info: false,
                    kind: func.kind.into(),
                },
            };
            tracing::debug!(
                target: "tern::bcgen",
                function = %func.name,
                id = bytecode_id,
                size = header.bytecode_size_in_bytes,
                frame_size = header.frame_size,
                "generated function"
            );

            let (opcodes, handlers) = sink.into_parts();
            header.flags.has_exception_handler = !handlers.is_empty();
            let mut bytecode = BytecodeFunction::new(opcodes, header, handlers);
            if let Some(offsets) = debug_offsets {
                bytecode.set_debug_offsets(offsets);
                has_debug_info = true;
            }
            output.set_function(bytecode_id, bytecode);
        }

        output.literal_value_buffer = buffers.value_buffer;
        output.object_key_buffer = buffers.key_buffer;
        output.string_table = strings;
        if has_debug_info {
            output.debug_info = Some(debug_info.serialize());
        }
        Ok(output)
    }
}
